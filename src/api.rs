// API client module: a small blocking HTTP client for the Cirrus Notes
// REST API. Every operation is one signed round trip: build the OAuth
// 1.0a Authorization header over the method, URL and form parameters,
// issue the request, then normalize the response (HTTP 500 carries a
// structured {message, error} body, anything else is parsed as the
// operation's JSON shape).

use crate::error::{Error, Result};
use crate::model::{
    AttachmentInfo, AttachmentWire, Credentials, NoteInfo, NotePathWire, NoteWire, NotebookInfo,
    NotebookWire, UserInfo, UserWire,
};
use oauth1_request as oauth;
use reqwest::blocking::multipart;
use reqwest::header::AUTHORIZATION;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;

/// Base URL of the hosted Cirrus Notes service.
pub const DEFAULT_BASE_URL: &str = "https://api.cirrusnotes.com";

/// API client holding the application credentials, the base URL of the
/// service, and an optional per-user access token. The access token is
/// required by every resource operation and is only replaced by the
/// authorization flow; see [`Client::request_token`].
pub struct Client {
    http: reqwest::blocking::Client,
    base_url: String,
    app: Credentials,
    access_token: Option<Credentials>,
}

// Form parameter sets. Each derives both the OAuth signature input and
// the serde shape sent as the form body, so the signed parameters are
// always exactly the transmitted ones.

#[derive(Serialize, oauth::Request)]
struct NoParams {}

#[derive(Serialize, oauth::Request)]
struct NotebookName<'a> {
    name: &'a str,
}

#[derive(Serialize, oauth::Request)]
struct NotebookPath<'a> {
    notebook: &'a str,
}

#[derive(Serialize, oauth::Request)]
struct NotePath<'a> {
    path: &'a str,
}

#[derive(Serialize, oauth::Request)]
struct NoteDestination<'a> {
    notebook: &'a str,
    path: &'a str,
}

impl Client {
    /// Creates a client for the service at `base_url`, authenticated as
    /// the application identified by `app`. No access token is set; load
    /// a persisted one with [`Client::set_access_token`] or obtain one
    /// through the authorization flow.
    pub fn new(app: Credentials, base_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::blocking::Client::builder().build()?;
        Ok(Client {
            http,
            base_url: base_url.into(),
            app,
            access_token: None,
        })
    }

    /// Installs a previously obtained access token.
    pub fn set_access_token(&mut self, token: Credentials) {
        self.access_token = Some(token);
    }

    pub fn access_token(&self) -> Option<&Credentials> {
        self.access_token.as_ref()
    }

    fn app_credentials(&self) -> oauth::Credentials<String> {
        oauth::Credentials::new(self.app.token.clone(), self.app.secret.clone())
    }

    fn oauth_token(&self) -> Result<oauth::Token<&str, &str>> {
        let access = self.access_token.as_ref().ok_or(Error::NoAccessToken)?;
        Ok(oauth::Token::from_parts(
            self.app.token.as_str(),
            self.app.secret.as_str(),
            access.token.as_str(),
            access.secret.as_str(),
        ))
    }

    /// Requests short-lived temporary credentials, the first leg of the
    /// three-legged authorization flow.
    pub fn request_temporary_credentials(&self) -> Result<Credentials> {
        let url = format!("{}/oauth/request_token", self.base_url);
        let builder: oauth::Builder<'_, oauth::HmacSha1> =
            oauth::Builder::new(self.app_credentials(), oauth::HMAC_SHA1);
        let authorization = builder.post(&url, &());
        tracing::debug!(%url, "POST");
        let res = self
            .http
            .post(&url)
            .header(AUTHORIZATION, authorization)
            .send()?;
        let (status, body) = read_response(res)?;
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            return Err(server_failure(&body));
        }
        parse_token_response(&body)
    }

    /// The consent URL the user must visit to authorize the temporary
    /// credentials. Pure; no network call.
    pub fn authorization_url(&self, temporary: &Credentials) -> String {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("oauth_token", &temporary.token)
            .finish();
        format!("{}/oauth/authorize?{}", self.base_url, query)
    }

    /// Exchanges authorized temporary credentials and the user-supplied
    /// verifier for a long-lived access token. On success the token is
    /// stored on the client and returned for persistence.
    pub fn request_token(
        &mut self,
        temporary: &Credentials,
        verifier: &str,
    ) -> Result<Credentials> {
        let url = format!("{}/oauth/access_token", self.base_url);
        let mut builder = oauth::Builder::new(self.app_credentials(), oauth::HMAC_SHA1);
        builder.token(oauth::Credentials::new(
            temporary.token.clone(),
            temporary.secret.clone(),
        ));
        builder.verifier(verifier);
        let authorization = builder.post(&url, &());
        tracing::debug!(%url, "POST");
        let res = self
            .http
            .post(&url)
            .header(AUTHORIZATION, authorization)
            .send()?;
        let (status, body) = read_response(res)?;
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            return Err(server_failure(&body));
        }
        let access = parse_token_response(&body)?;
        self.access_token = Some(access.clone());
        Ok(access)
    }

    /// Fetches account information for the authorized user.
    pub fn user_info(&self) -> Result<UserInfo> {
        let url = format!("{}/yws/open/user/get.json", self.base_url);
        let token = self.oauth_token()?;
        let authorization = oauth::get(&url, &(), &token, oauth::HMAC_SHA1);
        tracing::debug!(%url, "GET");
        let res = self
            .http
            .get(&url)
            .header(AUTHORIZATION, authorization)
            .send()?;
        let (status, body) = read_response(res)?;
        let wire: UserWire = decode(status, &body)?;
        Ok(wire.into())
    }

    /// Creates a notebook with the given name.
    pub fn create_notebook(&self, name: &str) -> Result<NotebookInfo> {
        let url = format!("{}/yws/open/notebook/create.json", self.base_url);
        let (status, body) = self.signed_post(&url, &NotebookName { name })?;
        let wire: NotebookWire = decode(status, &body)?;
        Ok(wire.into())
    }

    /// Returns all notebooks, in server order.
    pub fn list_notebooks(&self) -> Result<Vec<NotebookInfo>> {
        let url = format!("{}/yws/open/notebook/all.json", self.base_url);
        let (status, body) = self.signed_post(&url, &NoParams {})?;
        let wire: Vec<NotebookWire> = decode(status, &body)?;
        Ok(wire.into_iter().map(NotebookInfo::from).collect())
    }

    /// Returns the notebook whose name equals `name` exactly, or `None`.
    /// The service has no lookup-by-name endpoint, so this scans
    /// [`Client::list_notebooks`].
    pub fn find_notebook(&self, name: &str) -> Result<Option<NotebookInfo>> {
        let notebooks = self.list_notebooks()?;
        Ok(notebooks.into_iter().find(|notebook| notebook.name == name))
    }

    /// Deletes the notebook at `path`.
    pub fn delete_notebook(&self, path: &str) -> Result<()> {
        let url = format!("{}/yws/open/notebook/delete.json", self.base_url);
        let (status, body) = self.signed_post(&url, &NotebookPath { notebook: path })?;
        expect_ok(status, &body)
    }

    /// Lists the paths of all notes in the notebook at `notebook`.
    pub fn list_notes(&self, notebook: &str) -> Result<Vec<String>> {
        let url = format!("{}/yws/open/notebook/list.json", self.base_url);
        let (status, body) = self.signed_post(&url, &NotebookPath { notebook })?;
        decode(status, &body)
    }

    /// Creates a note in the notebook at `notebook` and returns the path
    /// of the new note.
    pub fn create_note(
        &self,
        notebook: &str,
        title: &str,
        author: &str,
        source: &str,
        content: &str,
    ) -> Result<String> {
        let url = format!("{}/yws/open/note/create.json", self.base_url);
        let form = multipart::Form::new()
            .text("notebook", notebook.to_owned())
            .text("title", title.to_owned())
            .text("author", author.to_owned())
            .text("source", source.to_owned())
            .text("content", content.to_owned());
        let (status, body) = self.multipart_post(&url, form)?;
        let wire: NotePathWire = decode(status, &body)?;
        Ok(wire.path)
    }

    /// Fetches the note at `path`, including its content.
    pub fn note_info(&self, path: &str) -> Result<NoteInfo> {
        let url = format!("{}/yws/open/note/get.json", self.base_url);
        let (status, body) = self.signed_post(&url, &NotePath { path })?;
        let wire: NoteWire = decode(status, &body)?;
        Ok(wire.into())
    }

    /// Replaces every field of the note at `path`. There is no partial
    /// update; pass the current value for fields that should not change.
    pub fn update_note(
        &self,
        path: &str,
        title: &str,
        author: &str,
        source: &str,
        content: &str,
    ) -> Result<()> {
        let url = format!("{}/yws/open/note/update.json", self.base_url);
        let form = multipart::Form::new()
            .text("path", path.to_owned())
            .text("title", title.to_owned())
            .text("author", author.to_owned())
            .text("source", source.to_owned())
            .text("content", content.to_owned());
        let (status, body) = self.multipart_post(&url, form)?;
        expect_ok(status, &body)
    }

    /// Deletes the note at `path`.
    pub fn delete_note(&self, path: &str) -> Result<()> {
        let url = format!("{}/yws/open/note/delete.json", self.base_url);
        let (status, body) = self.signed_post(&url, &NotePath { path })?;
        expect_ok(status, &body)
    }

    /// Moves the note at `path` into the notebook at `notebook`.
    pub fn move_note(&self, path: &str, notebook: &str) -> Result<()> {
        let url = format!("{}/yws/open/note/move.json", self.base_url);
        let (status, body) = self.signed_post(&url, &NoteDestination { notebook, path })?;
        expect_ok(status, &body)
    }

    /// Uploads a local file as an attachment and returns its stored
    /// location.
    pub fn upload_attachment(&self, file: &Path) -> Result<AttachmentInfo> {
        let url = format!("{}/yws/open/resource/upload.json", self.base_url);
        let handle = File::open(file)?;
        let file_name = file
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("attachment")
            .to_owned();
        let part = multipart::Part::reader(handle)
            .file_name(file_name)
            .mime_str(mime_for_path(file))?;
        let form = multipart::Form::new().part("file", part);
        let (status, body) = self.multipart_post(&url, form)?;
        let wire: AttachmentWire = decode(status, &body)?;
        Ok(wire.into())
    }

    /// Resolves an attachment link through a signed request and returns
    /// the final URL after any redirects.
    pub fn authorize_download_link(&self, link: &str) -> Result<String> {
        let token = self.oauth_token()?;
        let authorization = oauth::get(link, &(), &token, oauth::HMAC_SHA1);
        tracing::debug!(url = %link, "GET");
        let res = self
            .http
            .get(link)
            .header(AUTHORIZATION, authorization)
            .send()?;
        let final_url = res.url().to_string();
        if res.status() == StatusCode::INTERNAL_SERVER_ERROR {
            return Err(server_failure(&res.text()?));
        }
        Ok(final_url)
    }

    /// Issues a form POST signed over the method, URL and `params`. The
    /// same `params` value drives the signature and the form body.
    fn signed_post<R>(&self, url: &str, params: &R) -> Result<(StatusCode, String)>
    where
        R: oauth::Request + Serialize,
    {
        let token = self.oauth_token()?;
        let authorization = oauth::post(url, params, &token, oauth::HMAC_SHA1);
        tracing::debug!(%url, "POST");
        let res = self
            .http
            .post(url)
            .header(AUTHORIZATION, authorization)
            .form(params)
            .send()?;
        read_response(res)
    }

    /// Issues a multipart POST. The multipart payload is excluded from
    /// the OAuth signature; only the method, URL and protocol parameters
    /// are signed.
    fn multipart_post(&self, url: &str, form: multipart::Form) -> Result<(StatusCode, String)> {
        let token = self.oauth_token()?;
        let authorization = oauth::post(url, &(), &token, oauth::HMAC_SHA1);
        tracing::debug!(%url, "POST multipart");
        let res = self
            .http
            .post(url)
            .header(AUTHORIZATION, authorization)
            .multipart(form)
            .send()?;
        read_response(res)
    }
}

fn read_response(res: reqwest::blocking::Response) -> Result<(StatusCode, String)> {
    let status = res.status();
    let body = res.text()?;
    Ok((status, body))
}

/// Parses `body` as the expected JSON shape after routing HTTP-500
/// bodies into the structured server error.
fn decode<T: DeserializeOwned>(status: StatusCode, body: &str) -> Result<T> {
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        return Err(server_failure(body));
    }
    serde_json::from_str(body).map_err(|error| {
        tracing::warn!(%error, body, "response is not the expected JSON");
        Error::MalformedResponse {
            body: body.to_owned(),
        }
    })
}

/// Success check for operations whose response body carries nothing of
/// interest (delete, move, update).
fn expect_ok(status: StatusCode, body: &str) -> Result<()> {
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        return Err(server_failure(body));
    }
    Ok(())
}

/// Builds the server error from an HTTP-500 body. Bodies that fail to
/// parse as {message, error} degrade to code `Unknown` with the raw body
/// kept in the message.
fn server_failure(body: &str) -> Error {
    #[derive(Deserialize, Default)]
    #[serde(default)]
    struct FailWire {
        message: String,
        error: String,
    }

    match serde_json::from_str::<FailWire>(body) {
        Ok(fail) => Error::Server {
            code: fail.error,
            message: fail.message,
        },
        Err(_) => Error::Server {
            code: "Unknown".to_owned(),
            message: format!("unparseable failure body: {body}"),
        },
    }
}

/// Parses the form-encoded body of the temporary-credential and
/// access-token endpoints.
fn parse_token_response(body: &str) -> Result<Credentials> {
    let mut token = None;
    let mut secret = None;
    for (key, value) in form_urlencoded::parse(body.as_bytes()) {
        match &*key {
            "oauth_token" => token = Some(value.into_owned()),
            "oauth_token_secret" => secret = Some(value.into_owned()),
            _ => {}
        }
    }
    match (token, secret) {
        (Some(token), Some(secret)) => Ok(Credentials { token, secret }),
        _ => Err(Error::MalformedResponse {
            body: body.to_owned(),
        }),
    }
}

fn mime_for_path(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|extension| extension.to_str())
        .map(|extension| extension.to_ascii_lowercase());
    match extension.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("txt") => "text/plain",
        Some("htm") | Some("html") => "text/html",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_failure_exposes_code_and_message() {
        let error = server_failure(r#"{"message":"bad token","error":"1007"}"#);
        assert_eq!(error.server_code(), Some("1007"));
        assert_eq!(error.to_string(), "server error 1007: bad token");
    }

    #[test]
    fn unparseable_failure_body_degrades_to_unknown() {
        let error = server_failure("<html>oops</html>");
        assert_eq!(error.server_code(), Some("Unknown"));
        assert!(error.to_string().contains("<html>oops</html>"));
    }

    #[test]
    fn non_json_success_body_is_malformed_response() {
        let result: Result<Vec<String>> = decode(StatusCode::OK, "not json at all");
        match result {
            Err(Error::MalformedResponse { body }) => assert_eq!(body, "not json at all"),
            other => panic!("expected MalformedResponse, got {other:?}"),
        }
    }

    #[test]
    fn status_500_wins_over_body_shape() {
        let result: Result<Vec<String>> = decode(
            StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"message":"nope","error":"42"}"#,
        );
        assert_eq!(result.unwrap_err().server_code(), Some("42"));
    }

    #[test]
    fn token_response_parses_both_fields() {
        let credentials =
            parse_token_response("oauth_token=abc&oauth_token_secret=s%20ecret&extra=1").unwrap();
        assert_eq!(credentials.token, "abc");
        assert_eq!(credentials.secret, "s ecret");
    }

    #[test]
    fn incomplete_token_response_is_malformed() {
        assert!(matches!(
            parse_token_response("oauth_token=abc"),
            Err(Error::MalformedResponse { .. })
        ));
    }

    #[test]
    fn mime_detection_falls_back_to_octet_stream() {
        assert_eq!(mime_for_path(Path::new("photo.PNG")), "image/png");
        assert_eq!(mime_for_path(Path::new("notes.txt")), "text/plain");
        assert_eq!(
            mime_for_path(Path::new("archive.zip")),
            "application/octet-stream"
        );
        assert_eq!(mime_for_path(Path::new("noext")), "application/octet-stream");
    }
}
