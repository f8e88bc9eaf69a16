#[cfg(test)]
pub mod test_utils {
    use crate::auth::mail::{MailError, Mailer};
    use crate::auth::tokens::TokenService;
    use crate::config::AppConfig;
    use crate::router::create_router;
    use crate::schemas::AppState;
    use axum::http::HeaderValue;
    use axum_test::TestServer;
    use migration::{Migrator, MigratorTrait};
    use model::entities::user::{self, UserRole};
    use sea_orm::{ActiveModelTrait, ConnectionTrait, Database, DatabaseConnection, Set};
    use std::sync::{Arc, Mutex};
    use tracing::Level;
    use tracing_subscriber::FmtSubscriber;

    /// A confirmation code handed to the mailer seam.
    pub struct SentMail {
        pub recipient: String,
        pub username: String,
        pub code: String,
    }

    /// Mailer that records instead of delivering, so tests can read the
    /// code back out.
    #[derive(Default)]
    pub struct RecordingMailer {
        pub sent: Mutex<Vec<SentMail>>,
    }

    #[async_trait::async_trait]
    impl Mailer for RecordingMailer {
        async fn send_confirmation_code(
            &self,
            recipient: &str,
            username: &str,
            code: &str,
        ) -> Result<(), MailError> {
            self.sent
                .lock()
                .expect("mailer mutex poisoned")
                .push(SentMail {
                    recipient: recipient.to_string(),
                    username: username.to_string(),
                    code: code.to_string(),
                });
            Ok(())
        }
    }

    /// Create an in-memory SQLite database for testing
    pub async fn setup_test_db() -> DatabaseConnection {
        let db = Database::connect("sqlite::memory:")
            .await
            .expect("Failed to connect to in-memory database");

        // Enable foreign keys so cascade rules actually fire
        db.execute_unprepared("PRAGMA foreign_keys = ON;")
            .await
            .expect("Failed to enable foreign keys");

        // Run migrations
        Migrator::up(&db, None)
            .await
            .expect("Failed to run migrations");

        db
    }

    /// Initialize tracing for tests with output to STDERR.
    ///
    /// The log level is determined by the RUST_LOG environment variable,
    /// defaulting to WARN if not set.
    fn init_test_tracing() -> tracing::subscriber::DefaultGuard {
        let log_level = std::env::var("RUST_LOG")
            .ok()
            .and_then(|level| match level.to_uppercase().as_str() {
                "ERROR" => Some(Level::ERROR),
                "WARN" => Some(Level::WARN),
                "INFO" => Some(Level::INFO),
                "DEBUG" => Some(Level::DEBUG),
                "TRACE" => Some(Level::TRACE),
                _ => None,
            })
            .unwrap_or(Level::WARN);

        let subscriber = FmtSubscriber::builder()
            .with_max_level(log_level)
            .with_writer(std::io::stderr)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    /// A running test server plus seeded identities of each role.
    pub struct TestApp {
        pub server: TestServer,
        pub db: DatabaseConnection,
        pub mailer: Arc<RecordingMailer>,
        pub admin_token: String,
        pub moderator_token: String,
        pub alice_token: String,
        pub bob_token: String,
        _tracing: tracing::subscriber::DefaultGuard,
    }

    async fn seed_user(db: &DatabaseConnection, username: &str, role: UserRole) -> user::Model {
        user::ActiveModel {
            username: Set(username.to_string()),
            email: Set(format!("{username}@example.com")),
            role: Set(role),
            is_staff: Set(false),
            is_superuser: Set(false),
            ..Default::default()
        }
        .insert(db)
        .await
        .expect("Failed to seed test user")
    }

    /// Create a test server over a fresh database with one user of each
    /// role already minted a token.
    pub async fn setup_test_app() -> TestApp {
        let tracing_guard = init_test_tracing();

        let db = setup_test_db().await;
        let config = AppConfig {
            token_secret: "test-secret".to_string(),
            reserved_username: "me".to_string(),
        };
        let tokens = TokenService::new(&config.token_secret);

        let admin = seed_user(&db, "admin", UserRole::Admin).await;
        let moderator = seed_user(&db, "moody", UserRole::Moderator).await;
        let alice = seed_user(&db, "alice", UserRole::User).await;
        let bob = seed_user(&db, "bob", UserRole::User).await;

        let admin_token = tokens.issue_access_token(&admin).expect("token");
        let moderator_token = tokens.issue_access_token(&moderator).expect("token");
        let alice_token = tokens.issue_access_token(&alice).expect("token");
        let bob_token = tokens.issue_access_token(&bob).expect("token");

        let mailer = Arc::new(RecordingMailer::default());
        let state = AppState {
            db: db.clone(),
            config,
            mailer: mailer.clone(),
        };

        let server = TestServer::new(create_router(state)).expect("Failed to start test server");

        TestApp {
            server,
            db,
            mailer,
            admin_token,
            moderator_token,
            alice_token,
            bob_token,
            _tracing: tracing_guard,
        }
    }

    /// Authorization header value for a bearer token.
    pub fn bearer(token: &str) -> HeaderValue {
        HeaderValue::from_str(&format!("Bearer {token}")).expect("Invalid header value")
    }
}
