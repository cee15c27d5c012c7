// API client module: a small blocking HTTP client that talks to a
// partner's cloud endpoints. One instance plays the role of a browser
// session (shared cookie store, fixed User-Agent) across the two calls
// an invocation makes: the OAuth token refresh and the document upload.

use anyhow::Context;
use reqwest::blocking::{multipart, Client, Response};
use reqwest::StatusCode;
use serde::Deserialize;
use std::ffi::OsStr;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::{ClientConfig, Config, Tokens};
use crate::error::{Error, RequestError, Result};
use crate::partner::{self, PartnerSetting};

/// User-Agent the partner endpoints expect; they reject unknown clients,
/// so we impersonate the web reader's browser.
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/51.0.2704.103 Safari/537.36";

/// Client for one partner cloud session. Holds the blocking HTTP client
/// and the path of the config file it loads tokens from and persists
/// refreshed tokens to.
pub struct CloudClient {
    http: Client,
    config_path: PathBuf,
}

/// Shape of the upload response; the service nests the assigned document
/// id inside a `metadata` object.
#[derive(Deserialize)]
struct UploadResponse {
    metadata: UploadMetadata,
}

#[derive(Deserialize)]
struct UploadMetadata {
    #[serde(rename = "deliverableId")]
    deliverable_id: String,
}

impl CloudClient {
    /// Build a session for the given config file.
    pub fn new(config_path: PathBuf) -> anyhow::Result<Self> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .cookie_store(true)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(CloudClient { http, config_path })
    }

    /// Exchange the stored refresh token for a fresh access/refresh pair
    /// and persist it. The config file is only written after a successful
    /// exchange; on any failure it is left as it was.
    pub fn refresh_tokens(&self, client_name: &str) -> Result<()> {
        let config = Config::read(&self.config_path)?;
        let setting = partner::lookup(config.client(client_name)?.partner_id)?;
        self.refresh_against(&setting, config, client_name)
    }

    // Split from `refresh_tokens` so tests can point it at a local server.
    fn refresh_against(
        &self,
        setting: &PartnerSetting,
        mut config: Config,
        client_name: &str,
    ) -> Result<()> {
        let entry = config.client_mut(client_name)?;
        let fresh = self
            .request_refresh(setting, &entry.tokens.refresh_token)
            .map_err(Error::TokenRefresh)?;
        debug!(client = client_name, "storing refreshed token pair");
        entry.tokens = fresh;
        config.write(&self.config_path)
    }

    /// POST the form-encoded `refresh_token` grant and parse the new token
    /// pair out of the JSON body.
    fn request_refresh(
        &self,
        setting: &PartnerSetting,
        refresh_token: &str,
    ) -> std::result::Result<Tokens, RequestError> {
        let params = [
            ("client_id", setting.client_id.as_str()),
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];
        debug!(url = %setting.token_url, ?params, "requesting token refresh");
        let res = self.http.post(&setting.token_url).form(&params).send()?;
        let (status, body) = trace_response(res)?;
        if !status.is_success() {
            return Err(RequestError::Status(status));
        }
        serde_json::from_str(&body).map_err(|e| RequestError::Payload(e.to_string()))
    }

    /// Upload a file to the client's partner cloud and return the
    /// deliverable id the service assigned to it.
    pub fn upload(&self, client_name: &str, file_path: &Path) -> Result<String> {
        let config = Config::read(&self.config_path)?;
        let entry = config.client(client_name)?;
        let setting = partner::lookup(entry.partner_id)?;
        self.send_upload(&setting, entry, file_path)
            .map_err(Error::Upload)
    }

    fn send_upload(
        &self,
        setting: &PartnerSetting,
        entry: &ClientConfig,
        file_path: &Path,
    ) -> std::result::Result<String, RequestError> {
        let name = file_path
            .file_name()
            .and_then(OsStr::to_str)
            .unwrap_or("document.pdf");
        let mime = mime_for_path(file_path);

        // The handle moves into the multipart part and is closed when the
        // request body is dropped, on success and failure alike.
        let file = File::open(file_path)?;
        let part = multipart::Part::reader(file)
            .file_name(name.to_string())
            .mime_str(mime)?;
        let form = multipart::Form::new().part("file", part);

        debug!(url = %setting.upload_url, file = %file_path.display(), mime, "uploading");
        let res = self
            .http
            .post(&setting.upload_url)
            .header("t_auth_token", &entry.tokens.access_token)
            .header("hardware_id", &entry.hardware_id)
            .header("reseller_id", entry.partner_id.to_string())
            .multipart(form)
            .send()?;
        let (status, body) = trace_response(res)?;
        if status != StatusCode::OK {
            return Err(RequestError::Status(status));
        }
        let parsed: UploadResponse =
            serde_json::from_str(&body).map_err(|e| RequestError::Payload(e.to_string()))?;
        Ok(parsed.metadata.deliverable_id)
    }
}

/// MIME type for an upload, chosen by file extension (case-insensitive).
/// Unknown and missing extensions fall back to `application/pdf`.
pub fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(OsStr::to_str)
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("epub") => "application/epub+zip",
        _ => "application/pdf",
    }
}

/// Log status, headers, cookies and body of a response at debug level,
/// then hand back the status and the raw body text. Parsing happens on
/// the captured text so tracing and parsing see the same bytes.
fn trace_response(res: Response) -> std::result::Result<(StatusCode, String), RequestError> {
    let status = res.status();
    debug!(status = %status, "HTTP response");
    for (name, value) in res.headers() {
        debug!(header = %name, value = ?value);
    }
    for cookie in res.cookies() {
        debug!(cookie = %cookie.name(), value = %cookie.value());
    }
    let body = res.text()?;
    debug!(%body, "response body");
    Ok((status, body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use std::collections::BTreeMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn test_setting(base_url: &str) -> PartnerSetting {
        PartnerSetting {
            client_id: "webreader".to_string(),
            scope: "SCOPE_TEST".to_string(),
            token_url: format!("{base_url}/auth/oauth2/token"),
            upload_url: format!("{base_url}/rest/upload"),
        }
    }

    fn test_config(partner_id: u32) -> Config {
        let mut clients = BTreeMap::new();
        clients.insert(
            "bookworm".to_string(),
            ClientConfig {
                partner_id,
                hardware_id: "hw-0001".to_string(),
                tokens: Tokens {
                    access_token: "A1".to_string(),
                    refresh_token: "R1".to_string(),
                },
            },
        );
        Config { clients }
    }

    fn write_config_file(config: &Config) -> NamedTempFile {
        let file = NamedTempFile::new().unwrap();
        config.write(file.path()).unwrap();
        file
    }

    fn client_for(file: &NamedTempFile) -> CloudClient {
        CloudClient::new(file.path().to_path_buf()).unwrap()
    }

    #[test]
    fn refresh_persists_the_new_token_pair() {
        let mut server = Server::new();
        let mock = server
            .mock("POST", "/auth/oauth2/token")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("client_id".into(), "webreader".into()),
                Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()),
                Matcher::UrlEncoded("refresh_token".into(), "R1".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"access_token":"A2","refresh_token":"R2","expires_in":600}"#)
            .create();

        let file = write_config_file(&test_config(3));
        let api = client_for(&file);
        let config = Config::read(file.path()).unwrap();
        api.refresh_against(&test_setting(&server.url()), config, "bookworm")
            .unwrap();

        mock.assert();
        let saved = Config::read(file.path()).unwrap();
        let tokens = &saved.client("bookworm").unwrap().tokens;
        assert_eq!(tokens.access_token, "A2");
        assert_eq!(tokens.refresh_token, "R2");
    }

    #[test]
    fn refresh_rejected_by_server_leaves_config_untouched() {
        let mut server = Server::new();
        server
            .mock("POST", "/auth/oauth2/token")
            .with_status(500)
            .with_body("internal error")
            .create();

        let file = write_config_file(&test_config(3));
        let api = client_for(&file);
        let config = Config::read(file.path()).unwrap();
        let err = api
            .refresh_against(&test_setting(&server.url()), config, "bookworm")
            .unwrap_err();

        assert!(matches!(
            err,
            Error::TokenRefresh(RequestError::Status(s)) if s == StatusCode::INTERNAL_SERVER_ERROR
        ));
        assert_eq!(Config::read(file.path()).unwrap(), test_config(3));
    }

    #[test]
    fn refresh_with_incomplete_body_leaves_config_untouched() {
        let mut server = Server::new();
        server
            .mock("POST", "/auth/oauth2/token")
            .with_status(200)
            .with_body(r#"{"access_token":"A2"}"#)
            .create();

        let file = write_config_file(&test_config(3));
        let api = client_for(&file);
        let config = Config::read(file.path()).unwrap();
        let err = api
            .refresh_against(&test_setting(&server.url()), config, "bookworm")
            .unwrap_err();

        assert!(matches!(err, Error::TokenRefresh(RequestError::Payload(_))));
        assert_eq!(Config::read(file.path()).unwrap(), test_config(3));
    }

    #[test]
    fn upload_returns_the_deliverable_id() {
        let mut server = Server::new();
        let mock = server
            .mock("POST", "/rest/upload")
            .match_header("t_auth_token", "A1")
            .match_header("hardware_id", "hw-0001")
            .match_header("reseller_id", "3")
            .with_status(200)
            .with_body(r#"{"metadata":{"deliverableId":"D123"}}"#)
            .create();

        let file = write_config_file(&test_config(3));
        let api = client_for(&file);
        let mut doc = tempfile::Builder::new().suffix(".pdf").tempfile().unwrap();
        doc.write_all(b"%PDF-1.4 not really a pdf").unwrap();

        let config = test_config(3);
        let entry = config.client("bookworm").unwrap();
        let id = api
            .send_upload(&test_setting(&server.url()), entry, doc.path())
            .unwrap();

        mock.assert();
        assert_eq!(id, "D123");
    }

    #[test]
    fn upload_forbidden_is_a_status_error() {
        let mut server = Server::new();
        server
            .mock("POST", "/rest/upload")
            .with_status(403)
            .create();

        let file = write_config_file(&test_config(3));
        let api = client_for(&file);
        let mut doc = tempfile::Builder::new().suffix(".epub").tempfile().unwrap();
        doc.write_all(b"zipped epub bytes").unwrap();

        let config = test_config(3);
        let entry = config.client("bookworm").unwrap();
        let err = api
            .send_upload(&test_setting(&server.url()), entry, doc.path())
            .unwrap_err();

        assert!(matches!(err, RequestError::Status(s) if s == StatusCode::FORBIDDEN));
    }

    #[test]
    fn upload_without_deliverable_id_is_a_payload_error() {
        let mut server = Server::new();
        server
            .mock("POST", "/rest/upload")
            .with_status(200)
            .with_body(r#"{"metadata":{}}"#)
            .create();

        let file = write_config_file(&test_config(3));
        let api = client_for(&file);
        let doc = tempfile::Builder::new().suffix(".pdf").tempfile().unwrap();

        let config = test_config(3);
        let entry = config.client("bookworm").unwrap();
        let err = api
            .send_upload(&test_setting(&server.url()), entry, doc.path())
            .unwrap_err();

        assert!(matches!(err, RequestError::Payload(_)));
    }

    #[test]
    fn unregistered_partner_fails_before_any_request() {
        let file = write_config_file(&test_config(99));
        let api = client_for(&file);

        let err = api.refresh_tokens("bookworm").unwrap_err();
        assert!(matches!(err, Error::UnknownPartner(99)));

        let err = api.upload("bookworm", Path::new("book.pdf")).unwrap_err();
        assert!(matches!(err, Error::UnknownPartner(99)));
    }

    #[test]
    fn unknown_client_name_fails_before_any_request() {
        let file = write_config_file(&test_config(3));
        let api = client_for(&file);

        let err = api.refresh_tokens("stranger").unwrap_err();
        assert!(matches!(err, Error::UnknownClient(name) if name == "stranger"));
    }

    #[test]
    fn mime_type_follows_the_extension() {
        assert_eq!(mime_for_path(Path::new("a.pdf")), "application/pdf");
        assert_eq!(mime_for_path(Path::new("a.PDF")), "application/pdf");
        assert_eq!(mime_for_path(Path::new("b.epub")), "application/epub+zip");
        assert_eq!(mime_for_path(Path::new("b.EPUB")), "application/epub+zip");
    }

    #[test]
    fn unrecognized_extensions_default_to_pdf() {
        assert_eq!(mime_for_path(Path::new("notes.txt")), "application/pdf");
        assert_eq!(mime_for_path(Path::new("archive.tar.gz")), "application/pdf");
        assert_eq!(mime_for_path(Path::new("no_extension")), "application/pdf");
    }
}
