//! Helpers to read query parameters.
use std::collections::BTreeMap;

use crate::Error;

pub type Params = BTreeMap<String, String>;

/// Collects the query parameters of a request. Only the first value of a
/// repeated key is kept.
pub fn params(query: Option<&str>) -> Params {
    let mut params = Params::new();
    for (key, value) in url::form_urlencoded::parse(query.unwrap_or_default().as_bytes()) {
        params
            .entry(key.into_owned())
            .or_insert_with(|| value.into_owned());
    }
    params
}

/// Returns the non-empty value of `key`, if any.
pub fn get<'a>(params: &'a Params, key: &str) -> Option<&'a str> {
    params
        .get(key)
        .map(String::as_str)
        .filter(|v| !v.is_empty())
}

/// Splits the value of `key` on commas, skipping empty elements.
pub fn comma_separated(params: &Params, key: &str) -> Vec<String> {
    get(params, key)
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default()
}

/// A flag is set if it's present with a value other than `0`, `false`,
/// `no` or `off`.
pub fn bool_param(params: &Params, key: &str) -> bool {
    match get(params, key) {
        None => false,
        Some(v) => !matches!(
            v.to_ascii_lowercase().as_str(),
            "0" | "false" | "no" | "off"
        ),
    }
}

/// Returns the required `id` parameter. It must not look like a command line
/// flag.
pub fn snapshot_id(params: &Params) -> Result<&str, Error> {
    match get(params, "id") {
        None => Err(Error::Validation("no snapshot id given".into())),
        Some(id) if id.starts_with('-') => Err(Error::Validation(format!(
            "invalid snapshot id '{}'",
            id
        ))),
        Some(id) => Ok(id),
    }
}

/// Returns the value of `key`, which must be an absolute path if present.
pub fn absolute_path<'a>(params: &'a Params, key: &str) -> Result<Option<&'a str>, Error> {
    match get(params, key) {
        Some(path) if !path.starts_with('/') => Err(Error::Validation(format!(
            "{} must be an absolute path, starting with a forward slash '/', got '{}'",
            key, path
        ))),
        path => Ok(path),
    }
}

#[cfg(test)]
mod tests {
    use super::{absolute_path, bool_param, comma_separated, params, snapshot_id};
    use rstest::rstest;

    #[test]
    fn first_value_wins() {
        let p = params(Some("id=abc&id=def&path=%2Ftest%20dir&empty="));
        assert_eq!("abc", p["id"]);
        assert_eq!("/test dir", p["path"]);
        assert_eq!("", p["empty"]);
    }

    #[test]
    fn no_query() {
        assert!(params(None).is_empty());
    }

    #[rstest]
    #[case::missing("", vec![])]
    #[case::empty("tag=", vec![])]
    #[case::single("tag=daily", vec!["daily"])]
    #[case::multiple("tag=daily,,weekly%2C%20monthly", vec!["daily", "weekly", "monthly"])]
    fn comma_separated_values(#[case] query: &str, #[case] expected: Vec<&str>) {
        assert_eq!(expected, comma_separated(&params(Some(query)), "tag"));
    }

    #[rstest]
    #[case::missing("", false)]
    #[case::empty("long=", false)]
    #[case::one("long=1", true)]
    #[case::zero("long=0", false)]
    #[case::word("long=yes", true)]
    #[case::false_word("long=False", false)]
    fn bool_values(#[case] query: &str, #[case] expected: bool) {
        assert_eq!(expected, bool_param(&params(Some(query)), "long"));
    }

    #[rstest]
    #[case::missing("", None)]
    #[case::empty("id=", None)]
    #[case::latest("id=latest", Some("latest"))]
    #[case::short_id("id=4bba301e", Some("4bba301e"))]
    #[case::long_flag("id=--password-command%3Dtouch%20%2Ftmp%2Fx", None)]
    #[case::short_flag("id=-r", None)]
    fn snapshot_ids(#[case] query: &str, #[case] expected: Option<&str>) {
        let p = params(Some(query));
        assert_eq!(expected, snapshot_id(&p).ok());
    }

    #[rstest]
    #[case::missing("", Some(None))]
    #[case::absolute("dir=%2Fetc", Some(Some("/etc")))]
    #[case::relative("dir=etc", None)]
    fn absolute_paths(#[case] query: &str, #[case] expected: Option<Option<&str>>) {
        let p = params(Some(query));
        assert_eq!(expected, absolute_path(&p, "dir").ok());
    }
}
