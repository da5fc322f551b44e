use std::path::Path;
use std::sync::{Arc, Mutex};

use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::task::JoinHandle;

use soundshelf::config::ServerConfig;
use soundshelf::mail::{Email, Mailer};
use soundshelf::media::LocalMediaRelay;
use soundshelf::server::{AppState, create_router};
use soundshelf::store::{SqliteStore, Store};

/// Captures outgoing email so tests can read codes and reset links.
#[derive(Default)]
pub struct Mailbox {
    sent: Mutex<Vec<Email>>,
}

impl Mailer for Mailbox {
    fn deliver(&self, email: Email) {
        self.sent.lock().expect("mailbox lock").push(email);
    }
}

impl Mailbox {
    pub fn last_to(&self, address: &str) -> Email {
        self.sent
            .lock()
            .expect("mailbox lock")
            .iter()
            .rev()
            .find(|e| e.to == address)
            .cloned()
            .unwrap_or_else(|| panic!("no email sent to {address}"))
    }

    pub fn verification_code(&self, address: &str) -> String {
        let email = self.last_to(address);
        email
            .body
            .split_whitespace()
            .find(|w| w.len() == 6 && w.chars().all(|c| c.is_ascii_digit()))
            .expect("verification code in email")
            .to_string()
    }

    pub fn reset_token(&self, address: &str) -> String {
        let email = self.last_to(address);
        let start = email.body.find("token=").expect("reset link in email") + "token=".len();
        let rest = &email.body[start..];
        let end = rest.find('&').expect("userId after token");
        rest[..end].to_string()
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub password: String,
    pub token: String,
}

/// Router served in-process on an ephemeral port, backed by a temp directory.
pub struct TestServer {
    pub temp_dir: TempDir,
    pub base_url: String,
    pub mailbox: Arc<Mailbox>,
    pub client: reqwest::Client,
    server_task: JoinHandle<()>,
}

impl TestServer {
    pub async fn start() -> Self {
        let temp_dir = TempDir::new().expect("create temp dir");

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let port = listener.local_addr().expect("local addr").port();
        let base_url = format!("http://127.0.0.1:{port}");

        let config = ServerConfig {
            port,
            data_dir: temp_dir.path().to_path_buf(),
            public_base_url: Some(base_url.clone()),
            ..ServerConfig::default()
        };

        let store = SqliteStore::new(config.db_path()).expect("open store");
        store.initialize().expect("initialize store");

        let mailbox = Arc::new(Mailbox::default());
        let media = Arc::new(LocalMediaRelay::new(temp_dir.path(), base_url.clone()));
        let state = Arc::new(
            AppState::with_services(Arc::new(store), media, mailbox.clone(), config)
                .expect("build app state"),
        );

        let app = create_router(state);
        let server_task = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve");
        });

        Self {
            temp_dir,
            base_url,
            mailbox,
            client: reqwest::Client::new(),
            server_task,
        }
    }

    pub fn data_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/api/v1{path}", self.base_url)
    }

    /// Registers, verifies and signs in a new user.
    pub async fn verified_user(&self, name: &str) -> TestUser {
        let user = self.unverified_user(name).await;
        let code = self.mailbox.verification_code(&user.email);

        let resp = self
            .client
            .post(self.url("/users/verify-email"))
            .json(&json!({ "token": code, "userId": user.id }))
            .send()
            .await
            .expect("verify email");
        assert_eq!(resp.status(), 200, "verify email failed");

        user
    }

    /// Registers and signs in without verifying the email address.
    pub async fn unverified_user(&self, name: &str) -> TestUser {
        let email = format!("{}@example.com", name.to_lowercase());
        let password = "correct horse battery".to_string();

        let resp = self
            .client
            .post(self.url("/users/add"))
            .json(&json!({ "name": name, "email": email, "password": password }))
            .send()
            .await
            .expect("register");
        assert_eq!(resp.status(), 201, "register failed");
        let body: Value = resp.json().await.expect("register body");
        let id = body["user"]["id"].as_str().expect("user id").to_string();

        let token = self.sign_in(&email, &password).await;

        TestUser {
            id,
            email,
            password,
            token,
        }
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> String {
        let resp = self
            .client
            .post(self.url("/users/sign-in"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .expect("sign in");
        assert_eq!(resp.status(), 200, "sign in failed");
        let body: Value = resp.json().await.expect("sign in body");
        body["token"].as_str().expect("token").to_string()
    }

    /// Uploads an audio file with a declared duration. Returns the audio id.
    pub async fn upload_audio(
        &self,
        user: &TestUser,
        title: &str,
        category: &str,
        duration: f64,
    ) -> String {
        let form = reqwest::multipart::Form::new()
            .text("title", title.to_string())
            .text("about", format!("About {title}"))
            .text("category", category.to_string())
            .text("duration", duration.to_string())
            .part(
                "audio",
                reqwest::multipart::Part::bytes(b"ID3 not really audio".to_vec())
                    .file_name("track.mp3"),
            );

        let resp = self
            .client
            .post(self.url("/audio/add"))
            .bearer_auth(&user.token)
            .multipart(form)
            .send()
            .await
            .expect("upload audio");
        assert_eq!(resp.status(), 201, "upload failed");
        let body: Value = resp.json().await.expect("upload body");
        body["audio"]["id"].as_str().expect("audio id").to_string()
    }

    pub async fn get(&self, user: Option<&TestUser>, path: &str) -> (u16, Value) {
        let mut req = self.client.get(self.url(path));
        if let Some(user) = user {
            req = req.bearer_auth(&user.token);
        }
        Self::finish(req).await
    }

    pub async fn post(&self, user: &TestUser, path: &str, body: Option<Value>) -> (u16, Value) {
        let mut req = self.client.post(self.url(path)).bearer_auth(&user.token);
        if let Some(body) = body {
            req = req.json(&body);
        }
        Self::finish(req).await
    }

    pub async fn patch(&self, user: &TestUser, path: &str, body: Value) -> (u16, Value) {
        Self::finish(self.client.patch(self.url(path)).bearer_auth(&user.token).json(&body)).await
    }

    pub async fn delete(&self, user: &TestUser, path: &str) -> (u16, Value) {
        Self::finish(self.client.delete(self.url(path)).bearer_auth(&user.token)).await
    }

    async fn finish(req: reqwest::RequestBuilder) -> (u16, Value) {
        let resp = req.send().await.expect("send request");
        let status = resp.status().as_u16();
        let body = resp.json().await.unwrap_or(Value::Null);
        (status, body)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.server_task.abort();
    }
}
