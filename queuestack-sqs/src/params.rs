//! Flat request parameters decoded from a query string and form body

use std::collections::HashMap;

use crate::error::SqsError;

/// Parameter name -> every value supplied for it, in arrival order
#[derive(Debug, Default, Clone)]
pub struct Params {
    values: HashMap<String, Vec<String>>,
}

impl Params {
    /// Decode the URL query string (if any) followed by an urlencoded body.
    pub fn parse(query: Option<&str>, body: &[u8]) -> Self {
        let query_pairs = query
            .map(|q| form_urlencoded::parse(q.as_bytes()))
            .into_iter()
            .flatten();
        let body_pairs = form_urlencoded::parse(body);

        Self::from_pairs(
            query_pairs
                .chain(body_pairs)
                .map(|(k, v)| (k.into_owned(), v.into_owned())),
        )
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut values: HashMap<String, Vec<String>> = HashMap::new();
        for (k, v) in pairs {
            values.entry(k.into()).or_default().push(v.into());
        }
        Self { values }
    }

    /// First value supplied for `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .and_then(|v| v.first())
            .map(String::as_str)
    }

    /// First value for `key`, with an empty value counting as absent
    pub fn get_non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|v| !v.is_empty())
    }

    pub fn get_all(&self, key: &str) -> Option<&[String]> {
        self.values.get(key).map(Vec::as_slice)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn require(&self, key: &str) -> Result<&str, SqsError> {
        self.get_non_empty(key).ok_or_else(|| {
            SqsError::MissingParameter(format!(
                "A required parameter {} is not supplied.",
                key
            ))
        })
    }

    /// Optional integer parameter; empty means omitted, anything else must parse.
    pub fn get_i64(&self, key: &str) -> Result<Option<i64>, SqsError> {
        self.get_non_empty(key)
            .map(|raw| parse_integer(key, raw))
            .transpose()
    }

    /// Collect `Attribute.<n>.Name` / `Attribute.<n>.Value` pairs for n = 1, 2, ...
    pub fn attributes(&self) -> Result<HashMap<String, String>, SqsError> {
        let mut attributes = HashMap::new();
        for n in 1.. {
            let Some(name) = self.get(&format!("Attribute.{}.Name", n)) else {
                break;
            };
            let value = self.get(&format!("Attribute.{}.Value", n)).ok_or_else(|| {
                SqsError::MissingParameter(format!(
                    "The request must contain the parameter Attribute.{}.Value.",
                    n
                ))
            })?;
            attributes.insert(name.to_string(), value.to_string());
        }
        Ok(attributes)
    }

    /// Collect `AttributeName.<n>` values for n = 1, 2, ...
    pub fn attribute_names(&self) -> Vec<String> {
        (1..)
            .map_while(|n| self.get(&format!("AttributeName.{}", n)).map(str::to_string))
            .collect()
    }
}

pub(crate) fn parse_integer(key: &str, raw: &str) -> Result<i64, SqsError> {
    raw.trim().parse::<i64>().map_err(|_| {
        SqsError::InvalidParameterValue(format!(
            "Parameter {} should be of type Integer",
            key
        ))
    })
}
