/// Identifiers typed by the user, split into the usable ones and the rest.
#[derive(Debug, Default, PartialEq)]
pub struct IdList {
    pub ids: Vec<u64>,
    pub rejected: Vec<String>,
}

/// Parse a comma separated list of positive numeric ids.
///
/// Blank entries are skipped, duplicates keep their first position, and
/// anything that is not a positive integer ends up in `rejected`.
pub fn parse_id_list(input: &str) -> IdList {
    let mut list = IdList::default();

    for token in input.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        match token.parse::<u64>() {
            Ok(id) if id > 0 => {
                if !list.ids.contains(&id) {
                    list.ids.push(id);
                }
            }
            _ => list.rejected.push(token.to_string()),
        }
    }

    list
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_id_list() {
        let list = parse_id_list(" 33538, 33539 ,12345");
        assert_eq!(list.ids, vec![33538, 33539, 12345]);
        assert!(list.rejected.is_empty());
    }

    #[test]
    fn test_parse_id_list_rejects_invalid_tokens() {
        let list = parse_id_list("12, abc, -4, 0, 12, , 7.5, 99");
        assert_eq!(list.ids, vec![12, 99]);
        assert_eq!(list.rejected, vec!["abc", "-4", "0", "7.5"]);
    }

    #[test]
    fn test_parse_id_list_empty_input() {
        assert_eq!(parse_id_list("  "), IdList::default());
    }
}
