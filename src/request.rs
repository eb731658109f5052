use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Value type for a request keyword.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestValue {
    Str(String),
    StrList(Vec<String>),
}

impl From<&str> for RequestValue {
    fn from(value: &str) -> Self {
        RequestValue::Str(value.to_string())
    }
}

impl From<&String> for RequestValue {
    fn from(value: &String) -> Self {
        RequestValue::Str(value.clone())
    }
}

impl From<Vec<&str>> for RequestValue {
    fn from(value: Vec<&str>) -> Self {
        RequestValue::StrList(value.into_iter().map(|s| s.to_string()).collect())
    }
}

impl RequestValue {
    /// Split a MARS list such as `0/6/12` into its elements.
    pub fn slash_list(s: &str) -> Self {
        let items: Vec<&str> = s
            .split('/')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect();
        RequestValue::from(items)
    }

    /// MARS wire form: lists are joined with `/`.
    pub fn to_mars(&self) -> String {
        match self {
            RequestValue::Str(s) => s.clone(),
            RequestValue::StrList(xs) => xs.join("/"),
        }
    }
}

/// MARS-like request expressed as keyword/value pairs plus the file the
/// result is written to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Request {
    pub(crate) inner: BTreeMap<String, RequestValue>,
    target: Option<PathBuf>,
}

impl Request {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a keyword/value pair (value can be a scalar or list).
    pub fn kw(mut self, key: impl Into<String>, value: impl Into<RequestValue>) -> Self {
        self.inner.insert(key.into(), value.into());
        self
    }

    // Keyword builders for the fields a TIGGE retrieval uses.
    pub fn class(self, v: impl Into<RequestValue>) -> Self {
        self.kw("class", v)
    }

    pub fn dataset(self, v: impl Into<RequestValue>) -> Self {
        self.kw("dataset", v)
    }

    pub fn date(self, v: impl Into<RequestValue>) -> Self {
        self.kw("date", v)
    }

    pub fn expver(self, v: impl Into<RequestValue>) -> Self {
        self.kw("expver", v)
    }

    pub fn grid(self, v: impl Into<RequestValue>) -> Self {
        self.kw("grid", v)
    }

    pub fn area(self, v: impl Into<RequestValue>) -> Self {
        self.kw("area", v)
    }

    pub fn levtype(self, v: impl Into<RequestValue>) -> Self {
        self.kw("levtype", v)
    }

    pub fn origin(self, v: impl Into<RequestValue>) -> Self {
        self.kw("origin", v)
    }

    pub fn param(self, v: impl Into<RequestValue>) -> Self {
        self.kw("param", v)
    }

    pub fn step(self, v: impl Into<RequestValue>) -> Self {
        self.kw("step", v)
    }

    pub fn time(self, v: impl Into<RequestValue>) -> Self {
        self.kw("time", v)
    }

    pub fn r#type(self, v: impl Into<RequestValue>) -> Self {
        self.kw("type", v)
    }

    pub fn target(mut self, path: impl Into<PathBuf>) -> Self {
        self.target = Some(path.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&RequestValue> {
        self.inner.get(key)
    }

    pub fn target_path(&self) -> Option<&Path> {
        self.target.as_deref()
    }

    /// The `dataset` keyword, which selects the service endpoint.
    pub fn dataset_name(&self) -> Result<String> {
        let v = self
            .get("dataset")
            .ok_or_else(|| Error::InvalidRequest("request has no dataset".into()))?;
        match v {
            RequestValue::Str(s) if !s.is_empty() => Ok(s.clone()),
            _ => Err(Error::InvalidRequest(format!(
                "dataset must be a single name, got {v:?}"
            ))),
        }
    }

    /// JSON body submitted to the service. The target stays local.
    pub fn to_body(&self) -> Value {
        let map: Map<String, Value> = self
            .inner
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.to_mars())))
            .collect();
        Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slash_lists_split_and_rejoin() {
        let v = RequestValue::slash_list("0/6/ 12/");
        assert_eq!(
            v,
            RequestValue::StrList(vec!["0".into(), "6".into(), "12".into()])
        );
        assert_eq!(v.to_mars(), "0/6/12");
        assert_eq!(
            RequestValue::slash_list("00:00:00/12:00:00").to_mars(),
            "00:00:00/12:00:00"
        );
    }

    #[test]
    fn body_excludes_target() {
        let r = Request::new()
            .dataset("tigge")
            .param("167")
            .step(RequestValue::slash_list("0/6"))
            .target("out/file.grib");
        let body = r.to_body();
        assert_eq!(body["dataset"], "tigge");
        assert_eq!(body["param"], "167");
        assert_eq!(body["step"], "0/6");
        assert!(body.get("target").is_none());
        assert_eq!(r.target_path(), Some(Path::new("out/file.grib")));
    }

    #[test]
    fn dataset_name_is_required() {
        assert!(Request::new().dataset_name().is_err());
        assert!(Request::new().dataset("").dataset_name().is_err());
        assert!(Request::new().dataset(vec!["a", "b"]).dataset_name().is_err());
        assert_eq!(Request::new().dataset("tigge").dataset_name().unwrap(), "tigge");
    }
}
