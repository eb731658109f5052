use std::fs::{self, OpenOptions};
use std::io::{self, Read};
use std::path::Path;
use std::thread;
use std::time::Duration;

use reqwest::Method;
use reqwest::blocking::{Client as HttpClient, Response};
use reqwest::header::{
    ACCEPT, FROM, HeaderMap, HeaderName, HeaderValue, LOCATION, RETRY_AFTER, USER_AGENT,
};
use serde_json::Value;
use url::Url;

use crate::credentials::Credentials;
use crate::error::{Error, Result as EResult};
use crate::request::Request;

const KEY_HEADER: HeaderName = HeaderName::from_static("x-ecmwf-key");
const DEFAULT_RETRY: Duration = Duration::from_secs(5);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Anything that can turn a [`Request`] into a file at its target.
pub trait Retrieve {
    fn retrieve(&self, request: &Request) -> EResult<()>;
}

#[derive(Clone)]
pub struct ClientOptions {
    pub url: String,
    pub key: String,
    pub email: String,
    pub verify_tls: bool,
    /// Poll interval used when the service sends no `Retry-After`.
    pub default_retry: Duration,
}

impl ClientOptions {
    pub fn from_credentials(c: Credentials) -> Self {
        Self {
            url: c.url,
            key: c.key,
            email: c.email,
            verify_tls: true,
            default_retry: DEFAULT_RETRY,
        }
    }
}

impl std::fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientOptions")
            .field("url", &self.url)
            .field("email", &self.email)
            .field("verify_tls", &self.verify_tls)
            .field("default_retry", &self.default_retry)
            .finish_non_exhaustive()
    }
}

/// Handle to the ECMWF Web API dataset service.
#[derive(Debug, Clone)]
pub struct DataServer {
    base_url: Url,
    default_retry: Duration,
    http: HttpClient,
}

impl DataServer {
    pub fn new(opts: ClientOptions) -> EResult<Self> {
        let base_url = Url::parse(&format!("{}/", opts.url.trim_end_matches('/')))?;

        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("tigge-download/", env!("CARGO_PKG_VERSION"))),
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(FROM, header_value("email", &opts.email)?);
        let mut key = header_value("key", &opts.key)?;
        key.set_sensitive(true);
        headers.insert(KEY_HEADER, key);

        let mut builder = HttpClient::builder()
            .default_headers(headers)
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(None);
        if !opts.verify_tls {
            builder = builder.danger_accept_invalid_certs(true);
        }
        let http = builder.build()?;

        Ok(Self {
            base_url,
            default_retry: opts.default_retry,
            http,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn requests_url(&self, dataset: &str) -> EResult<Url> {
        Ok(self.base_url.join(&format!("datasets/{dataset}/requests"))?)
    }

    fn call(
        &self,
        method: Method,
        url: &Url,
        body: Option<&Value>,
        job: &mut Job,
    ) -> EResult<()> {
        tracing::debug!(%method, %url, "web api call");
        let mut req = self.http.request(method, url.clone());
        if let Some(b) = body {
            req = req.json(b);
        }
        let resp = req.send()?;
        let code = resp.status().as_u16();
        let location = header_str(&resp, LOCATION);
        let retry_after = header_str(&resp, RETRY_AFTER);
        let text = resp.text()?;
        job.update(url, code, location.as_deref(), retry_after.as_deref(), &text)
    }

    fn wait_and_transfer(&self, job: &mut Job, target: &Path) -> EResult<u64> {
        let mut reported = job.status.clone();
        while !job.done {
            let location = job
                .location
                .clone()
                .ok_or_else(|| Error::Protocol("request accepted without a Location".into()))?;
            thread::sleep(job.retry);
            self.call(Method::GET, &location, None, job)?;
            if job.status != reported {
                tracing::debug!(status = ?job.status, "request status changed");
                reported = job.status.clone();
            }
        }

        let href = job.result_href(&self.base_url)?;
        let expected = job.last.get("size").and_then(|v| v.as_u64());
        self.transfer(&href, target, expected)
    }

    /// Stream `href` into `target`. A failed transfer leaves no file behind.
    fn transfer(&self, href: &Url, target: &Path, expected: Option<u64>) -> EResult<u64> {
        tracing::debug!(%href, target = %target.display(), ?expected, "transferring result");
        let mut resp = self.http.get(href.clone()).send()?.error_for_status()?;
        write_checked(&mut resp, target, expected)
    }

    fn cleanup(&self, job: &Job) {
        let Some(location) = &job.location else {
            return;
        };
        if let Err(e) = self
            .http
            .delete(location.clone())
            .send()
            .and_then(Response::error_for_status)
        {
            tracing::debug!(error = %e, "request cleanup failed");
        }
    }
}

impl Retrieve for DataServer {
    fn retrieve(&self, request: &Request) -> EResult<()> {
        let dataset = request.dataset_name()?;
        let target = request
            .target_path()
            .ok_or_else(|| Error::InvalidRequest("request has no target".into()))?;
        let url = self.requests_url(&dataset)?;

        let mut job = Job::new(self.default_retry);
        self.call(Method::POST, &url, Some(&request.to_body()), &mut job)?;
        if let Some(name) = job.last.get("name").and_then(|v| v.as_str()) {
            tracing::debug!(request_id = name, "request submitted");
        }

        let outcome = self.wait_and_transfer(&mut job, target);
        self.cleanup(&job);
        let bytes = outcome?;
        tracing::debug!(bytes, target = %target.display(), "result written");
        Ok(())
    }
}

/// Copy `reader` into `target`, checking the byte count against `expected`.
/// On any failure the partial file is removed so the next run requests it again.
fn write_checked(reader: &mut impl Read, target: &Path, expected: Option<u64>) -> EResult<u64> {
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(target)?;

    let written = io::copy(reader, &mut file)
        .map_err(Error::from)
        .and_then(|n| match expected {
            Some(e) if e != n => Err(Error::SizeMismatch {
                expected: e,
                actual: n,
            }),
            _ => Ok(n),
        });
    drop(file);

    if written.is_err() {
        if let Err(e) = fs::remove_file(target) {
            tracing::debug!(error = %e, "could not remove partial file");
        }
    }
    written
}

/// Server-side state of one submitted request, as learnt from its replies.
#[derive(Debug)]
struct Job {
    location: Option<Url>,
    retry: Duration,
    default_retry: Duration,
    status: Option<String>,
    done: bool,
    last: Value,
    /// How many entries of the reply's `messages` have been logged already.
    messages_seen: usize,
}

impl Job {
    fn new(default_retry: Duration) -> Self {
        Self {
            location: None,
            retry: default_retry,
            default_retry,
            status: None,
            done: false,
            last: Value::Null,
            messages_seen: 0,
        }
    }

    fn update(
        &mut self,
        url: &Url,
        code: u16,
        location: Option<&str>,
        retry_after: Option<&str>,
        body: &str,
    ) -> EResult<()> {
        let reply: Value = if body.trim().is_empty() {
            Value::Null
        } else {
            match serde_json::from_str(body) {
                Ok(v) => v,
                Err(_) if code >= 400 => {
                    return Err(Error::HttpStatus {
                        status: code,
                        body: truncate(body, 200),
                    });
                }
                Err(e) => return Err(e.into()),
            }
        };

        for m in self.new_messages(&reply) {
            tracing::debug!("{m}");
        }

        if let Some(err) = reply.get("error") {
            let msg = err.as_str().map(str::to_string).unwrap_or_else(|| err.to_string());
            return Err(Error::Service(msg));
        }
        if code >= 400 {
            return Err(Error::HttpStatus {
                status: code,
                body: truncate(body, 200),
            });
        }

        if let Some(loc) = location {
            self.location = Some(url.join(loc)?);
        }
        self.retry = retry_after
            .and_then(parse_retry_after)
            .unwrap_or(self.default_retry);

        if let Some(status) = reply.get("status").and_then(|s| s.as_str()) {
            if matches!(status, "aborted" | "failed") {
                return Err(Error::Service(format!("request {status}")));
            }
            self.status = Some(status.to_string());
        }

        self.done = code == 200 || self.status.as_deref() == Some("complete");
        self.last = reply;
        Ok(())
    }

    /// The service resends its whole message log on every poll.
    fn new_messages(&mut self, reply: &Value) -> Vec<String> {
        let Some(messages) = reply.get("messages").and_then(|m| m.as_array()) else {
            return Vec::new();
        };
        let fresh = messages
            .iter()
            .skip(self.messages_seen)
            .map(|m| m.as_str().map(str::to_string).unwrap_or_else(|| m.to_string()))
            .collect();
        self.messages_seen = self.messages_seen.max(messages.len());
        fresh
    }

    /// Where the finished result can be fetched, relative hrefs resolved
    /// against the request location.
    fn result_href(&self, base: &Url) -> EResult<Url> {
        let href = self
            .last
            .get("href")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::Protocol("completed reply has no href".into()))?;
        Ok(self.location.as_ref().unwrap_or(base).join(href)?)
    }
}

fn parse_retry_after(v: &str) -> Option<Duration> {
    v.trim().parse::<u64>().ok().map(Duration::from_secs)
}

fn header_str(resp: &Response, name: HeaderName) -> Option<String> {
    resp.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn header_value(what: &str, v: &str) -> EResult<HeaderValue> {
    HeaderValue::from_str(v)
        .map_err(|_| Error::Config(format!("{what} contains characters not allowed in a header")))
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((i, _)) => format!("{}...", &s[..i]),
        None => s.to_string(),
    }
}
