//! Registry client speaking the OCI distribution API over blocking HTTP.
//!
//! Supports anonymous access, HTTP Basic and the Bearer token challenge
//! flow. Blobs already present in the target repository are not uploaded
//! again.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs::File;

use regex::Regex;
use reqwest::blocking::{Body, Client, RequestBuilder, Response};
use reqwest::header::{ACCEPT, CONTENT_TYPE, LOCATION, WWW_AUTHENTICATE};
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{ReleaseToolError, Result};
use crate::oci::image::{Blob, BlobSource, Image, Manifest, MANIFEST_MEDIA_TYPE};
use crate::oci::reference::ImageReference;
use crate::oci::sha256_digest;

const DOCKER_CONTENT_DIGEST: &str = "Docker-Content-Digest";
const USER_AGENT: &str = concat!("release-tool/", env!("CARGO_PKG_VERSION"));

/// Destination for built images
pub trait Registry {
    /// Push every blob and the manifest under `reference`'s tag, returning
    /// the manifest digest
    fn push(&self, image: &Image, reference: &ImageReference) -> Result<String>;

    fn fetch_manifest(&self, reference: &ImageReference) -> Result<Manifest>;

    fn fetch_blob(&self, reference: &ImageReference, digest: &str) -> Result<Vec<u8>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryOptions {
    /// Use plain HTTP and accept invalid certificates
    pub insecure: bool,
    pub credentials: Option<Credentials>,
}

#[derive(Debug, Clone)]
enum Auth {
    Basic,
    Bearer(String),
}

#[derive(Deserialize)]
struct TokenResponse {
    token: Option<String>,
    access_token: Option<String>,
}

pub struct RegistryClient {
    http: Client,
    options: RegistryOptions,
    auth: RefCell<HashMap<String, Auth>>,
}

impl RegistryClient {
    pub fn new(options: RegistryOptions) -> Result<Self> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .danger_accept_invalid_certs(options.insecure)
            .build()
            .map_err(|e| ReleaseToolError::registry(format!("Failed to build HTTP client: {}", e)))?;

        Ok(RegistryClient {
            http,
            options,
            auth: RefCell::new(HashMap::new()),
        })
    }

    fn base_url(&self, reference: &ImageReference) -> String {
        let scheme = if self.options.insecure || reference.is_loopback() {
            "http"
        } else {
            "https"
        };
        format!(
            "{}://{}/v2/{}",
            scheme,
            reference.api_host(),
            reference.repository()
        )
    }

    fn authorize(&self, reference: &ImageReference, request: RequestBuilder) -> RequestBuilder {
        match self.auth.borrow().get(&reference.name()) {
            Some(Auth::Bearer(token)) => request.bearer_auth(token),
            Some(Auth::Basic) => match &self.options.credentials {
                Some(c) => request.basic_auth(&c.username, Some(&c.password)),
                None => request,
            },
            None => request,
        }
    }

    /// Send a request, answering one authentication challenge if the
    /// registry asks for it
    ///
    /// `build` runs once per attempt so streamed bodies can be reopened.
    fn send<F>(&self, reference: &ImageReference, build: F) -> Result<Response>
    where
        F: Fn(&Client) -> Result<RequestBuilder>,
    {
        let response = self
            .authorize(reference, build(&self.http)?)
            .send()
            .map_err(|e| ReleaseToolError::registry(format!("{}: {}", reference, e)))?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        let challenge = response
            .headers()
            .get(WWW_AUTHENTICATE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                ReleaseToolError::registry(format!(
                    "{}: unauthorized and no authentication challenge offered",
                    reference
                ))
            })?;

        let auth = self.answer_challenge(reference, &challenge)?;
        self.auth.borrow_mut().insert(reference.name(), auth);

        self.authorize(reference, build(&self.http)?)
            .send()
            .map_err(|e| ReleaseToolError::registry(format!("{}: {}", reference, e)))
    }

    fn answer_challenge(&self, reference: &ImageReference, challenge: &str) -> Result<Auth> {
        let (scheme, params) = challenge.split_once(' ').unwrap_or((challenge, ""));
        debug!(registry = reference.registry(), scheme, "authentication challenge");

        if scheme.eq_ignore_ascii_case("basic") {
            if self.options.credentials.is_none() {
                return Err(ReleaseToolError::registry(format!(
                    "{}: registry requires credentials",
                    reference
                )));
            }
            return Ok(Auth::Basic);
        }
        if !scheme.eq_ignore_ascii_case("bearer") {
            return Err(ReleaseToolError::registry(format!(
                "{}: unsupported authentication scheme '{}'",
                reference, scheme
            )));
        }

        let param_re = Regex::new(r#"(\w+)="([^"]*)""#)
            .map_err(|e| ReleaseToolError::registry(format!("Invalid pattern: {}", e)))?;
        let params: HashMap<&str, &str> = param_re
            .captures_iter(params)
            .filter_map(|c| Some((c.get(1)?.as_str(), c.get(2)?.as_str())))
            .collect();

        let realm = params.get("realm").ok_or_else(|| {
            ReleaseToolError::registry(format!("{}: bearer challenge without realm", reference))
        })?;
        let default_scope = format!("repository:{}:pull,push", reference.repository());
        let scope = params.get("scope").copied().unwrap_or(&default_scope);

        let mut query = vec![("scope", scope)];
        if let Some(service) = params.get("service") {
            query.push(("service", *service));
        }

        let mut request = self.http.get(*realm).query(&query);
        if let Some(c) = &self.options.credentials {
            request = request.basic_auth(&c.username, Some(&c.password));
        }

        let response = request
            .send()
            .map_err(|e| ReleaseToolError::registry(format!("token request failed: {}", e)))?;
        let response = expect_status(response, &[StatusCode::OK], "token request")?;
        let body: TokenResponse = response
            .json()
            .map_err(|e| ReleaseToolError::registry(format!("invalid token response: {}", e)))?;

        body.token
            .or(body.access_token)
            .map(Auth::Bearer)
            .ok_or_else(|| ReleaseToolError::registry("token response carried no token"))
    }

    fn blob_exists(&self, reference: &ImageReference, digest: &str) -> Result<bool> {
        let url = format!("{}/blobs/{}", self.base_url(reference), digest);
        let response = self.send(reference, |http| Ok(http.head(&url)))?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(ReleaseToolError::registry(format!(
                "{}: unexpected status {} checking blob {}",
                reference, status, digest
            ))),
        }
    }

    fn upload_blob(&self, reference: &ImageReference, blob: &Blob) -> Result<()> {
        let digest = blob.descriptor.digest.as_str();
        let base = self.base_url(reference);
        let start = format!("{}/blobs/uploads/", base);
        let response = self.send(reference, |http| Ok(http.post(&start)))?;
        let response = expect_status(response, &[StatusCode::ACCEPTED], "starting blob upload")?;

        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ReleaseToolError::registry("upload response carried no location"))?;

        let mut upload = Url::parse(&start)
            .and_then(|u| u.join(location))
            .map_err(|e| ReleaseToolError::registry(format!("invalid upload location: {}", e)))?;
        upload.query_pairs_mut().append_pair("digest", digest);

        let response = self.send(reference, |http| {
            Ok(http
                .put(upload.clone())
                .header(CONTENT_TYPE, "application/octet-stream")
                .body(blob_body(blob)?))
        })?;
        expect_status(response, &[StatusCode::CREATED], "uploading blob")?;
        Ok(())
    }
}

impl Registry for RegistryClient {
    fn push(&self, image: &Image, reference: &ImageReference) -> Result<String> {
        for blob in image.blobs() {
            let digest = &blob.descriptor.digest;
            if self.blob_exists(reference, digest)? {
                debug!(%digest, "blob already present");
                continue;
            }
            debug!(%digest, size = blob.descriptor.size, "uploading blob");
            self.upload_blob(reference, blob)?;
        }

        let url = format!("{}/manifests/{}", self.base_url(reference), reference.tag());
        let response = self.send(reference, |http| {
            Ok(http
                .put(&url)
                .header(CONTENT_TYPE, MANIFEST_MEDIA_TYPE)
                .body(image.manifest_bytes().to_vec()))
        })?;
        let response = expect_status(response, &[StatusCode::CREATED], "pushing manifest")?;

        let digest = response
            .headers()
            .get(DOCKER_CONTENT_DIGEST)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .unwrap_or_else(|| image.digest());
        info!(%reference, %digest, "pushed manifest");
        Ok(digest)
    }

    fn fetch_manifest(&self, reference: &ImageReference) -> Result<Manifest> {
        let url = format!("{}/manifests/{}", self.base_url(reference), reference.tag());
        let response = self.send(reference, |http| {
            Ok(http.get(&url).header(ACCEPT, MANIFEST_MEDIA_TYPE))
        })?;
        let response = expect_status(response, &[StatusCode::OK], "fetching manifest")?;

        response
            .json()
            .map_err(|e| ReleaseToolError::registry(format!("invalid manifest: {}", e)))
    }

    fn fetch_blob(&self, reference: &ImageReference, digest: &str) -> Result<Vec<u8>> {
        let url = format!("{}/blobs/{}", self.base_url(reference), digest);
        let response = self.send(reference, |http| Ok(http.get(&url)))?;
        let response = expect_status(response, &[StatusCode::OK], "fetching blob")?;

        let bytes = response
            .bytes()
            .map_err(|e| ReleaseToolError::registry(format!("reading blob {}: {}", digest, e)))?
            .to_vec();
        if sha256_digest(&bytes) != digest {
            return Err(ReleaseToolError::registry(format!(
                "blob {} failed digest verification",
                digest
            )));
        }
        Ok(bytes)
    }
}

/// Request body for a blob; file-backed layers are streamed from disk
fn blob_body(blob: &Blob) -> Result<Body> {
    match &blob.source {
        BlobSource::Bytes(bytes) => Ok(Body::from(bytes.clone())),
        BlobSource::File(path) => {
            let file = File::open(path).map_err(|e| {
                ReleaseToolError::registry(format!(
                    "Failed to open blob {}: {}",
                    path.display(),
                    e
                ))
            })?;
            Ok(Body::sized(file, blob.descriptor.size))
        }
    }
}

fn expect_status(response: Response, expected: &[StatusCode], action: &str) -> Result<Response> {
    let status = response.status();
    if expected.contains(&status) {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(ReleaseToolError::registry(format!(
        "{} returned {}: {}",
        action,
        status,
        body.trim()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(insecure: bool) -> RegistryClient {
        RegistryClient::new(RegistryOptions {
            insecure,
            credentials: None,
        })
        .unwrap()
    }

    #[test]
    fn test_base_url_uses_https_for_remote_registries() {
        let reference = ImageReference::parse("registry.example.com/team/app:1.0.0").unwrap();
        assert_eq!(
            client(false).base_url(&reference),
            "https://registry.example.com/v2/team/app"
        );
    }

    #[test]
    fn test_base_url_uses_http_for_loopback_and_insecure() {
        let local = ImageReference::parse("localhost:5000/test/image").unwrap();
        assert_eq!(
            client(false).base_url(&local),
            "http://localhost:5000/v2/test/image"
        );

        let remote = ImageReference::parse("registry.internal:5000/app").unwrap();
        assert_eq!(
            client(true).base_url(&remote),
            "http://registry.internal:5000/v2/app"
        );
    }

    #[test]
    fn test_docker_hub_routes_to_api_host() {
        let reference = ImageReference::parse("alpine").unwrap();
        assert_eq!(
            client(false).base_url(&reference),
            "https://registry-1.docker.io/v2/library/alpine"
        );
    }

    #[test]
    fn test_basic_challenge_without_credentials_fails() {
        let reference = ImageReference::parse("registry.example.com/app").unwrap();
        let err = client(false)
            .answer_challenge(&reference, r#"Basic realm="Registry""#)
            .unwrap_err();
        assert!(err.to_string().contains("requires credentials"));
    }

    #[test]
    fn test_unknown_challenge_scheme_fails() {
        let reference = ImageReference::parse("registry.example.com/app").unwrap();
        let err = client(false)
            .answer_challenge(&reference, "Negotiate")
            .unwrap_err();
        assert!(err.to_string().contains("unsupported authentication scheme"));
    }

    mod stub {
        use std::collections::HashMap;
        use std::io::{BufRead, BufReader, Read, Write};
        use std::net::{TcpListener, TcpStream};
        use std::sync::{Arc, Mutex};
        use std::thread;

        use crate::oci::sha256_digest;

        pub const TOKEN: &str = "stub-token";

        #[derive(Default)]
        pub struct State {
            /// `(method, target, authorized)` in arrival order
            pub requests: Vec<(String, String, bool)>,
            pub blobs: HashMap<String, Vec<u8>>,
            pub manifests: HashMap<String, Vec<u8>>,
        }

        /// A minimal distribution API that demands a bearer token
        pub fn serve(repository: &'static str) -> (u16, Arc<Mutex<State>>) {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            let port = listener.local_addr().unwrap().port();
            let state = Arc::new(Mutex::new(State::default()));

            let shared = Arc::clone(&state);
            thread::spawn(move || {
                for stream in listener.incoming().flatten() {
                    let state = Arc::clone(&shared);
                    thread::spawn(move || handle(stream, port, repository, state));
                }
            });
            (port, state)
        }

        fn handle(stream: TcpStream, port: u16, repository: &str, state: Arc<Mutex<State>>) {
            let mut writer = stream.try_clone().unwrap();
            let mut reader = BufReader::new(stream);

            loop {
                let mut request_line = String::new();
                if reader.read_line(&mut request_line).unwrap_or(0) == 0 {
                    return;
                }
                let mut parts = request_line.split_whitespace();
                let method = parts.next().unwrap_or_default().to_string();
                let target = parts.next().unwrap_or_default().to_string();

                let mut length = 0usize;
                let mut chunked = false;
                let mut authorized = false;
                loop {
                    let mut header = String::new();
                    reader.read_line(&mut header).unwrap();
                    let header = header.trim_end();
                    if header.is_empty() {
                        break;
                    }
                    let (name, value) = header.split_once(':').unwrap();
                    let value = value.trim();
                    if name.eq_ignore_ascii_case("content-length") {
                        length = value.parse().unwrap();
                    }
                    if name.eq_ignore_ascii_case("transfer-encoding") {
                        chunked = value.eq_ignore_ascii_case("chunked");
                    }
                    if name.eq_ignore_ascii_case("authorization") {
                        authorized = value == format!("Bearer {}", TOKEN);
                    }
                }
                let body = if chunked {
                    read_chunked(&mut reader)
                } else {
                    let mut body = vec![0; length];
                    reader.read_exact(&mut body).unwrap();
                    body
                };

                let response = route(&method, &target, authorized, body, port, repository, &state);
                writer.write_all(response.as_bytes()).unwrap();
            }
        }

        fn read_chunked(reader: &mut BufReader<TcpStream>) -> Vec<u8> {
            let mut body = Vec::new();
            loop {
                let mut size = String::new();
                reader.read_line(&mut size).unwrap();
                let size = usize::from_str_radix(size.trim(), 16).unwrap();
                let mut chunk = vec![0; size + 2];
                reader.read_exact(&mut chunk).unwrap();
                if size == 0 {
                    return body;
                }
                body.extend_from_slice(&chunk[..size]);
            }
        }

        fn route(
            method: &str,
            target: &str,
            authorized: bool,
            body: Vec<u8>,
            port: u16,
            repository: &str,
            state: &Mutex<State>,
        ) -> String {
            let mut state = state.lock().unwrap();
            state
                .requests
                .push((method.to_string(), target.to_string(), authorized));

            if target.starts_with("/token?") {
                let json = format!(r#"{{"token":"{}"}}"#, TOKEN);
                return reply("200 OK", &[], &json);
            }
            if !authorized {
                let challenge = format!(
                    r#"WWW-Authenticate: Bearer realm="http://127.0.0.1:{}/token",service="stub""#,
                    port
                );
                return reply("401 Unauthorized", &[&challenge], "");
            }

            let base = format!("/v2/{}", repository);
            let path = target.split('?').next().unwrap_or_default();
            let query = target.split_once('?').map(|(_, q)| q).unwrap_or_default();

            match method {
                "HEAD" => match path.strip_prefix(&format!("{}/blobs/", base)) {
                    Some(digest) if state.blobs.contains_key(digest) => reply("200 OK", &[], ""),
                    _ => reply("404 Not Found", &[], ""),
                },
                "POST" if path == format!("{}/blobs/uploads/", base) => {
                    let location = format!("Location: {}/blobs/uploads/abc?_state=x", base);
                    reply("202 Accepted", &[&location], "")
                }
                "PUT" if path == format!("{}/blobs/uploads/abc", base) => {
                    let digest = query
                        .split('&')
                        .find_map(|pair| pair.strip_prefix("digest="))
                        .unwrap_or_default()
                        .replace("%3A", ":");
                    if sha256_digest(&body) != digest {
                        return reply("400 Bad Request", &[], "DIGEST_INVALID");
                    }
                    state.blobs.insert(digest, body);
                    reply("201 Created", &[], "")
                }
                "PUT" => match path.strip_prefix(&format!("{}/manifests/", base)) {
                    Some(tag) => {
                        let digest = format!("Docker-Content-Digest: {}", sha256_digest(&body));
                        state.manifests.insert(tag.to_string(), body);
                        reply("201 Created", &[&digest], "")
                    }
                    None => reply("404 Not Found", &[], ""),
                },
                _ => reply("404 Not Found", &[], ""),
            }
        }

        fn reply(status: &str, headers: &[&str], body: &str) -> String {
            let mut response = format!("HTTP/1.1 {}\r\n", status);
            for header in headers {
                response.push_str(header);
                response.push_str("\r\n");
            }
            response.push_str(&format!("Content-Length: {}\r\n\r\n{}", body.len(), body));
            response
        }
    }

    fn layer_image(contents: &[u8]) -> (tempfile::NamedTempFile, Image) {
        use crate::oci::image::{Descriptor, LAYER_MEDIA_TYPE};
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents).unwrap();
        let layer = Descriptor {
            media_type: LAYER_MEDIA_TYPE.to_string(),
            digest: sha256_digest(contents),
            size: contents.len() as u64,
        };
        let image = Image::single_layer(
            layer,
            sha256_digest(b"uncompressed"),
            BlobSource::File(file.path().to_path_buf()),
        )
        .unwrap();
        (file, image)
    }

    #[test]
    fn test_push_uploads_blobs_then_manifest_with_bearer_token() {
        let (port, state) = stub::serve("team/app");
        let (_file, image) = layer_image(b"layer contents streamed from disk");
        let reference = ImageReference::parse(&format!("127.0.0.1:{}/team/app", port)).unwrap();
        let layer = image.manifest().layers[0].digest.clone();
        let config = image.manifest().config.digest.clone();

        let digest = client(false).push(&image, &reference).unwrap();
        assert_eq!(digest, image.digest());

        let state = state.lock().unwrap();
        let token_requests = state
            .requests
            .iter()
            .filter(|(_, target, _)| target.starts_with("/token?"))
            .count();
        assert_eq!(token_requests, 1);

        let authorized: Vec<String> = state
            .requests
            .iter()
            .filter(|(_, _, authorized)| *authorized)
            .map(|(method, target, _)| format!("{} {}", method, target.replace("%3A", ":")))
            .collect();
        assert_eq!(
            authorized,
            vec![
                format!("HEAD /v2/team/app/blobs/{}", layer),
                "POST /v2/team/app/blobs/uploads/".to_string(),
                format!("PUT /v2/team/app/blobs/uploads/abc?_state=x&digest={}", layer),
                format!("HEAD /v2/team/app/blobs/{}", config),
                "POST /v2/team/app/blobs/uploads/".to_string(),
                format!("PUT /v2/team/app/blobs/uploads/abc?_state=x&digest={}", config),
                "PUT /v2/team/app/manifests/latest".to_string(),
            ]
        );
        assert_eq!(
            state.blobs[&layer],
            b"layer contents streamed from disk".to_vec()
        );
        assert_eq!(state.manifests["latest"], image.manifest_bytes().to_vec());
    }

    #[test]
    fn test_push_skips_blobs_already_in_registry() {
        let (port, state) = stub::serve("team/app");
        let (_file, image) = layer_image(b"shared layer");
        let latest = ImageReference::parse(&format!("127.0.0.1:{}/team/app", port)).unwrap();
        let versioned = latest.with_tag("1.2.0").unwrap();

        let registry = client(false);
        let first = registry.push(&image, &latest).unwrap();
        state.lock().unwrap().requests.clear();
        let second = registry.push(&image, &versioned).unwrap();

        assert_eq!(first, second);
        let state = state.lock().unwrap();
        let methods: Vec<&str> = state
            .requests
            .iter()
            .map(|(method, _, _)| method.as_str())
            .collect();
        assert_eq!(methods, vec!["HEAD", "HEAD", "PUT"]);
        assert!(state.manifests.contains_key("1.2.0"));
    }
}
