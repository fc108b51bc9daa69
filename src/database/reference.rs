//! References: locations in the database plus accumulated queries.

use reqwest::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::database::Database;
use crate::error::{Error, Result};

/// Handle a live subscription would return. The streaming API has no
/// backing implementation, so this type cannot be constructed.
pub enum Listener {}

/// A location in the database plus optional query modifiers.
///
/// Every modifier returns a new value and leaves `self` untouched, so
/// a base reference can be reused across diverging queries. Terminal
/// operations ([`Reference::get`], [`Reference::set`],
/// [`Reference::push`], [`Reference::remove`]) turn the accumulated
/// state into a single HTTP request.
#[derive(Clone)]
pub struct Reference {
    db: Database,
    path: String,
    start_at: Option<Value>,
    end_at: Option<Value>,
    order_by: Option<Value>,
    equal_to: Option<Value>,
    limit_to_first: Option<u32>,
    limit_to_last: Option<u32>,
}

impl Reference {
    pub(crate) fn new(db: Database, path: &str) -> Self {
        Self {
            db,
            path: path.trim_matches('/').to_owned(),
            start_at: None,
            end_at: None,
            order_by: None,
            equal_to: None,
            limit_to_first: None,
            limit_to_last: None,
        }
    }

    /// Key of this location, the last segment of its path. The root
    /// reference has an empty key.
    pub fn key(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or_default()
    }

    /// Reference to the child at `path`, which may itself contain `/`
    /// separators.
    pub fn child(&self, path: &str) -> Reference {
        let mut next = self.clone();
        let child = path.trim_matches('/');
        if next.path.is_empty() {
            next.path = child.to_owned();
        } else if !child.is_empty() {
            next.path = format!("{}/{child}", next.path);
        }
        next
    }

    /// Parent location. The root is its own parent.
    pub fn parent(&self) -> Reference {
        let mut next = self.clone();
        next.path = match next.path.rfind('/') {
            Some(index) => next.path[..index].to_owned(),
            None => String::new(),
        };
        next
    }

    /// Fresh reference to the database root, without any query state.
    pub fn root(&self) -> Reference {
        Reference::new(self.db.clone(), "")
    }

    /// Start of the range of values returned by the query.
    pub fn start_at(&self, value: impl Into<Value>) -> Reference {
        let mut next = self.clone();
        next.start_at = Some(value.into());
        next
    }

    /// End of the range of values returned by the query.
    pub fn end_at(&self, value: impl Into<Value>) -> Reference {
        let mut next = self.clone();
        next.end_at = Some(value.into());
        next
    }

    /// Only return values equal to `value`.
    pub fn equal_to(&self, value: impl Into<Value>) -> Reference {
        let mut next = self.clone();
        next.equal_to = Some(value.into());
        next
    }

    /// Order results by the child named `key`.
    pub fn order_by_child(&self, key: &str) -> Reference {
        let mut next = self.clone();
        next.order_by = Some(Value::String(key.to_owned()));
        next
    }

    /// Order results by key.
    pub fn order_by_key(&self) -> Reference {
        let mut next = self.clone();
        next.order_by = Some(Value::String("$key".to_owned()));
        next
    }

    /// Order results by priority.
    pub fn order_by_priority(&self) -> Reference {
        let mut next = self.clone();
        next.order_by = Some(Value::String("$priority".to_owned()));
        next
    }

    /// Order results by value.
    pub fn order_by_value(&self) -> Reference {
        let mut next = self.clone();
        next.order_by = Some(Value::String("$value".to_owned()));
        next
    }

    /// Keep only the first `limit` results.
    pub fn limit_to_first(&self, limit: u32) -> Reference {
        let mut next = self.clone();
        next.limit_to_first = Some(limit);
        next
    }

    /// Keep only the last `limit` results.
    pub fn limit_to_last(&self, limit: u32) -> Reference {
        let mut next = self.clone();
        next.limit_to_last = Some(limit);
        next
    }

    /// Fetch the value at this location once.
    pub fn get(&self) -> Result<Snapshot> {
        let body = self.invoke(Method::GET, None)?;
        Ok(Snapshot {
            key: self.key().to_owned(),
            value: serde_json::from_str(&body)?,
        })
    }

    /// Overwrite the value at this location.
    pub fn set<T: Serialize>(&self, value: &T) -> Result<()> {
        self.invoke(Method::PUT, Some(serde_json::to_value(value)?))?;
        Ok(())
    }

    /// Append `value` under a server-generated child key.
    pub fn push<T: Serialize>(&self, value: &T) -> Result<()> {
        self.invoke(Method::POST, Some(serde_json::to_value(value)?))?;
        Ok(())
    }

    /// Delete the value at this location.
    pub fn remove(&self) -> Result<()> {
        self.invoke(Method::DELETE, None)?;
        Ok(())
    }

    /// Subscribe to value changes. Not implemented.
    pub fn on_value(&self) -> Result<Listener> {
        Err(Error::Unimplemented("on_value"))
    }

    /// Subscribe to added children. Not implemented.
    pub fn on_child_added(&self) -> Result<Listener> {
        Err(Error::Unimplemented("on_child_added"))
    }

    /// Subscribe to removed children. Not implemented.
    pub fn on_child_removed(&self) -> Result<Listener> {
        Err(Error::Unimplemented("on_child_removed"))
    }

    /// Subscribe to changed children. Not implemented.
    pub fn on_child_changed(&self) -> Result<Listener> {
        Err(Error::Unimplemented("on_child_changed"))
    }

    /// Subscribe to moved children. Not implemented.
    pub fn on_child_moved(&self) -> Result<Listener> {
        Err(Error::Unimplemented("on_child_moved"))
    }

    /// Build the request URL: path, access token, then every query
    /// modifier JSON-encoded individually.
    fn request_url(&self) -> Result<Url> {
        let mut url = Url::parse(&format!(
            "{}/{}.json",
            self.db.app.inner.database_url, self.path
        ))?;

        let mut pairs: Vec<(&str, String)> = Vec::new();
        if let Some(source) = &self.db.app.inner.token_source {
            pairs.push(("access_token", source.access_token()?));
        }
        for (name, value) in [
            ("startAt", &self.start_at),
            ("endAt", &self.end_at),
            ("orderBy", &self.order_by),
            ("equalTo", &self.equal_to),
        ] {
            if let Some(value) = value {
                pairs.push((name, serde_json::to_string(value)?));
            }
        }
        if let Some(limit) = self.limit_to_first {
            pairs.push(("limitToFirst", limit.to_string()));
        }
        if let Some(limit) = self.limit_to_last {
            pairs.push(("limitToLast", limit.to_string()));
        }
        if !pairs.is_empty() {
            url.query_pairs_mut().extend_pairs(pairs);
        }

        Ok(url)
    }

    fn invoke(&self, method: Method, body: Option<Value>) -> Result<String> {
        let url = self.request_url()?;
        debug!(%method, path = %self.path, "database request");

        let mut request = self.db.client.request(method, url).header(
            reqwest::header::CONTENT_TYPE,
            "application/json; charset=utf-8",
        );
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send()?;
        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            #[derive(serde::Deserialize)]
            struct Remote {
                error: String,
            }
            let message = serde_json::from_str::<Remote>(&body)
                .map(|remote| remote.error)
                .unwrap_or_else(|_| status.to_string());
            return Err(Error::Database(message));
        }

        Ok(body)
    }
}

/// Value read from the database, paired with the key of the location
/// it was read from.
#[derive(Clone, Debug)]
pub struct Snapshot {
    key: String,
    value: Value,
}

impl Snapshot {
    /// Key of the location the snapshot was taken at.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Whether the location held any value.
    pub fn exists(&self) -> bool {
        !self.value.is_null()
    }

    /// Raw JSON value.
    pub fn raw(&self) -> &Value {
        &self.value
    }

    /// Deserialize the snapshot into `T`.
    pub fn value<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.value.clone())?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::app::{App, AppOptions, StaticTokenSource};

    fn offline_db() -> Database {
        App::new(AppOptions {
            project_id: "demo".into(),
            database_url: "https://demo.firebaseio.com".into(),
            service_account: None,
            token_source: Some(Arc::new(StaticTokenSource::new("secret"))),
        })
        .database()
    }

    fn db_against(server: &MockServer) -> Database {
        App::new(AppOptions {
            project_id: "demo".into(),
            database_url: server.uri(),
            service_account: None,
            token_source: Some(Arc::new(StaticTokenSource::new("secret"))),
        })
        .database()
    }

    #[test]
    fn key_is_last_path_segment() {
        let db = offline_db();
        assert_eq!(db.reference("users").child("a").child("b").key(), "b");
        assert_eq!(db.root().key(), "");
    }

    #[test]
    fn parent_strips_last_segment() {
        let db = offline_db();
        assert_eq!(db.root().child("a/b").parent().key(), "a");
        assert_eq!(db.reference("a").parent().key(), "");
    }

    #[test]
    fn query_modifiers_land_in_the_url_json_encoded() {
        let db = offline_db();
        let url = db
            .reference("users")
            .limit_to_first(5)
            .order_by_key()
            .request_url()
            .unwrap();

        assert_eq!(url.path(), "/users.json");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("access_token".into(), "secret".into())));
        assert!(pairs.contains(&("limitToFirst".into(), "5".into())));
        assert!(pairs.contains(&("orderBy".into(), "\"$key\"".into())));
    }

    #[test]
    fn scalar_and_string_filters_encode_differently() {
        let db = offline_db();
        let url = db
            .reference("scores")
            .order_by_child("points")
            .start_at(10)
            .equal_to("alice")
            .request_url()
            .unwrap();

        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("orderBy".into(), "\"points\"".into())));
        assert!(pairs.contains(&("startAt".into(), "10".into())));
        assert!(pairs.contains(&("equalTo".into(), "\"alice\"".into())));
    }

    #[test]
    fn modifiers_leave_the_base_reference_untouched() {
        let db = offline_db();
        let base = db.reference("users");
        let _narrowed = base.limit_to_first(5).order_by_key();

        let url = base.request_url().unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs, vec![("access_token".into(), "secret".into())]);
    }

    #[test]
    fn get_returns_a_snapshot() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let server = rt.block_on(async {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/items.json"))
                .and(query_param("access_token", "secret"))
                .respond_with(
                    ResponseTemplate::new(200).set_body_json(json!({ "a": 1 })),
                )
                .mount(&server)
                .await;
            server
        });

        let snapshot = db_against(&server).reference("items").get().unwrap();
        assert_eq!(snapshot.key(), "items");
        assert!(snapshot.exists());
        assert_eq!(snapshot.raw(), &json!({ "a": 1 }));
    }

    #[test]
    fn set_puts_the_encoded_value() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let server = rt.block_on(async {
            let server = MockServer::start().await;
            Mock::given(method("PUT"))
                .and(path("/items/one.json"))
                .and(body_json(json!({ "name": "first" })))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_json(json!({ "name": "first" })),
                )
                .expect(1)
                .mount(&server)
                .await;
            server
        });

        let db = db_against(&server);
        db.reference("items/one")
            .set(&json!({ "name": "first" }))
            .unwrap();
    }

    #[test]
    fn push_posts_and_remove_deletes() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let server = rt.block_on(async {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/items.json"))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_json(json!({ "name": "-Nabc123" })),
                )
                .expect(1)
                .mount(&server)
                .await;
            Mock::given(method("DELETE"))
                .and(path("/items.json"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!(null)))
                .expect(1)
                .mount(&server)
                .await;
            server
        });

        let db = db_against(&server);
        db.reference("items").push(&json!({ "name": "x" })).unwrap();
        db.reference("items").remove().unwrap();
    }

    #[test]
    fn server_error_message_is_surfaced() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let server = rt.block_on(async {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .respond_with(
                    ResponseTemplate::new(401)
                        .set_body_json(json!({ "error": "Permission denied" })),
                )
                .mount(&server)
                .await;
            server
        });

        match db_against(&server).reference("secret").get() {
            Err(Error::Database(message)) => {
                assert_eq!(message, "Permission denied");
            }
            other => panic!("expected Database error, got {other:?}"),
        }
    }

    #[test]
    fn unparsable_error_body_falls_back_to_status_line() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let server = rt.block_on(async {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .respond_with(
                    ResponseTemplate::new(500).set_body_string("<html>boom</html>"),
                )
                .mount(&server)
                .await;
            server
        });

        match db_against(&server).reference("x").get() {
            Err(Error::Database(message)) => {
                assert_eq!(message, "500 Internal Server Error");
            }
            other => panic!("expected Database error, got {other:?}"),
        }
    }

    #[test]
    fn subscriptions_fail_loudly() {
        let db = offline_db();
        let reference = db.reference("chat");
        assert!(matches!(
            reference.on_value(),
            Err(Error::Unimplemented("on_value"))
        ));
        assert!(matches!(
            reference.on_child_added(),
            Err(Error::Unimplemented(_))
        ));
        assert!(matches!(
            reference.on_child_removed(),
            Err(Error::Unimplemented(_))
        ));
        assert!(matches!(
            reference.on_child_changed(),
            Err(Error::Unimplemented(_))
        ));
        assert!(matches!(
            reference.on_child_moved(),
            Err(Error::Unimplemented(_))
        ));
    }
}
