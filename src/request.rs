//! Incoming HTTP request type.

use http::Method;

/// An incoming HTTP request.
///
/// Middleware receive it mutably and may rewrite any part before passing it on.
#[derive(Clone, Debug)]
pub struct Request {
    pub(crate) method: Method,
    pub(crate) uri: String,
    pub(crate) query: Vec<(String, String)>,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) body: Vec<u8>,
}

impl Request {
    /// A request with no headers and no body.
    ///
    /// `target` may carry a query string; the path part is normalized to end
    /// with `/`.
    pub fn new(method: Method, target: &str) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, parse_query(query)),
            None => (target, Vec::new()),
        };
        Self {
            method,
            uri: normalize(path),
            query,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// Builds a request from the parts hyper hands over.
    ///
    /// A `_method` parameter overrides the wire method. The query string is
    /// checked first, then an `application/x-www-form-urlencoded` body.
    pub(crate) fn from_parts(parts: &http::request::Parts, body: Vec<u8>) -> Self {
        let target = parts.uri.path_and_query().map_or("/", |pq| pq.as_str());
        let mut req = Self::new(parts.method.clone(), target);
        req.headers = parts.headers.iter()
            .filter_map(|(k, v)| Some((k.as_str().to_owned(), v.to_str().ok()?.to_owned())))
            .collect();
        req.body = body;

        let overridden = req.query_param("_method")
            .map(str::to_owned)
            .or_else(|| req.form_param("_method"))
            .and_then(|m| m.to_ascii_uppercase().parse::<Method>().ok());
        if let Some(method) = overridden {
            req.method = method;
        }
        req
    }

    /// First value of `name` in a form-encoded body.
    fn form_param(&self, name: &str) -> Option<String> {
        let form = self.header("content-type")?
            .trim_start()
            .to_ascii_lowercase()
            .starts_with("application/x-www-form-urlencoded");
        if !form {
            return None;
        }
        form_urlencoded::parse(&self.body)
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.set_header(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn method(&self) -> &Method { &self.method }
    pub fn uri(&self) -> &str { &self.uri }
    pub fn headers(&self) -> &[(String, String)] { &self.headers }
    pub fn body(&self) -> &[u8] { &self.body }

    pub fn set_method(&mut self, method: Method) {
        self.method = method;
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Replaces every value of `name` with `value`.
    pub fn set_header(&mut self, name: &str, value: &str) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((name.to_ascii_lowercase(), value.to_owned()));
    }

    /// First value of a query-string parameter.
    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query.iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

fn parse_query(query: &str) -> Vec<(String, String)> {
    form_urlencoded::parse(query.as_bytes()).into_owned().collect()
}

fn normalize(path: &str) -> String {
    let mut uri = if path.starts_with('/') { path.to_owned() } else { format!("/{path}") };
    if !uri.ends_with('/') {
        uri.push('/');
    }
    uri
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uri_gains_a_trailing_slash_and_drops_the_query() {
        let req = Request::new(Method::GET, "/users/42?expand=posts&x=a%20b");
        assert_eq!(req.uri(), "/users/42/");
        assert_eq!(req.query_param("expand"), Some("posts"));
        assert_eq!(req.query_param("x"), Some("a b"));
        assert_eq!(Request::new(Method::GET, "").uri(), "/");
    }

    #[test]
    fn headers_are_case_insensitive() {
        let req = Request::new(Method::GET, "/")
            .with_header("Origin", "https://a.test")
            .with_header("ORIGIN", "https://b.test");
        assert_eq!(req.header("origin"), Some("https://b.test"));
        assert_eq!(req.headers().len(), 1);
    }

    #[test]
    fn method_override_from_query() {
        let (parts, ()) = http::Request::builder()
            .method("POST")
            .uri("/users/7?_method=delete")
            .header("x-a", "1")
            .body(())
            .unwrap()
            .into_parts();
        let req = Request::from_parts(&parts, b"{}".to_vec());
        assert_eq!(*req.method(), Method::DELETE);
        assert_eq!(req.uri(), "/users/7/");
        assert_eq!(req.header("X-A"), Some("1"));
        assert_eq!(req.body(), b"{}");
    }

    #[test]
    fn method_override_from_a_form_body() {
        let (parts, ()) = http::Request::builder()
            .method("POST")
            .uri("/users/7")
            .header("Content-Type", "application/x-www-form-urlencoded; charset=utf-8")
            .body(())
            .unwrap()
            .into_parts();
        let req = Request::from_parts(&parts, b"name=bob&_method=put".to_vec());
        assert_eq!(*req.method(), Method::PUT);
        assert_eq!(req.body(), b"name=bob&_method=put");

        let (parts, ()) = http::Request::builder()
            .method("POST")
            .uri("/users/7?_method=patch")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(())
            .unwrap()
            .into_parts();
        let req = Request::from_parts(&parts, b"_method=put".to_vec());
        assert_eq!(*req.method(), Method::PATCH);
    }

    #[test]
    fn json_bodies_never_override_the_method() {
        let (parts, ()) = http::Request::builder()
            .method("POST")
            .uri("/users")
            .header("content-type", "application/json")
            .body(())
            .unwrap()
            .into_parts();
        let req = Request::from_parts(&parts, b"_method=put".to_vec());
        assert_eq!(*req.method(), Method::POST);
    }
}
