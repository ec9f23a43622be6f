/// Flattens repeated `--attributes` values, splitting comma-separated
/// lists and dropping empties. `None` means "all attributes".
pub(crate) fn expand_attributes(values: &[String]) -> Option<Vec<String>> {
    let attrs: Vec<String> = values
        .iter()
        .flat_map(|item| item.split(','))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect();
    if attrs.is_empty() {
        None
    } else {
        Some(attrs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_and_trims() {
        let input = vec!["cn, mail".to_owned(), "sAMAccountName".to_owned()];
        assert_eq!(
            expand_attributes(&input).unwrap(),
            ["cn", "mail", "sAMAccountName"]
        );
        assert_eq!(expand_attributes(&[]), None);
        assert_eq!(expand_attributes(&[" , ".to_owned()]), None);
    }
}
