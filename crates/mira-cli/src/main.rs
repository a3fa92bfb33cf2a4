//! Mira CLI: operator commands and an interactive chat over the Mira services.
//!
//! Configuration comes from the environment (see `.env`). Every command
//! except `migrate` needs DATABASE_URL, SECRETS_MASTER_KEY and AUTH_SECRET.

use anyhow::{bail, Context};
use chrono::Local;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};

use mira_agent::tools::{LLM_NOT_CONFIGURED, TRELLO_NOT_CONFIGURED};
use mira_agent::{
    generate_project_plan, generate_status_report, with_instructions, Agent, ChatSession,
};
use mira_cli::app::{read_files, App};
use mira_cli::{init_tracing, mask_secret, truncate_string};
use mira_core::models::{ArtifactKind, CredentialKey, Role, SecretScope};
use mira_core::{Config, ErrorMetadata};
use mira_processing::{process_files, ArtifactOutputs, FileDetail};
use mira_services::SmtpMailer;

#[derive(Parser)]
#[command(name = "mira", about = "Mira TPM assistant")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply database migrations
    Migrate,
    /// Issue a login token for an email (creating the user if needed)
    LoginLink {
        #[arg(long)]
        email: String,
        /// Email the magic link instead of printing it
        #[arg(long)]
        send: bool,
    },
    /// Consume a login token and print its user
    VerifyToken {
        token: String,
    },
    /// Change a user's role (admins only)
    SetRole {
        /// Email of the administrator performing the change
        #[arg(long)]
        actor: String,
        /// Email of the user to change
        #[arg(long)]
        email: String,
        #[arg(long)]
        role: Role,
    },
    /// Credential management
    Secret {
        #[command(subcommand)]
        sub: SecretCommands,
    },
    /// Store files and record them in the document ledger
    Upload {
        #[arg(long)]
        email: String,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// List the documents of a user's company, newest first
    Documents {
        #[arg(long)]
        email: String,
    },
    /// Generate a project plan from documents
    Plan {
        #[arg(long)]
        email: String,
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Additional instructions or focus areas
        #[arg(long)]
        instructions: Option<String>,
    },
    /// Generate a status report from a Trello board
    Report {
        #[arg(long)]
        email: String,
        /// Board id or URL
        #[arg(long)]
        board: String,
    },
    /// Chat with the agent. `/clear` forgets the conversation, `/reset` also
    /// drops the document index, `/quit` exits.
    Chat {
        #[arg(long)]
        email: String,
        files: Vec<PathBuf>,
    },
}

#[derive(Subcommand)]
enum SecretCommands {
    /// Save a credential for a user or for the user's company
    Set {
        #[arg(long, value_enum)]
        scope: ScopeArg,
        #[arg(long)]
        key: CredentialKey,
        #[arg(long)]
        value: String,
        #[arg(long)]
        email: String,
    },
    /// Show which scope supplies each credential for a user
    Resolve {
        #[arg(long)]
        email: String,
        /// Only this key
        #[arg(long)]
        key: Option<CredentialKey>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ScopeArg {
    User,
    Company,
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize response")?;
    println!("{}", out);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = Config::from_env().context("Failed to load configuration")?;

    if let Commands::Migrate = cli.command {
        let pool = mira_db::connect(&config).await?;
        mira_db::run_migrations(&pool).await?;
        print_json(&serde_json::json!({ "success": true, "message": "Migrations applied" }))?;
        return Ok(());
    }

    let app = App::connect(config).await?;

    match cli.command {
        Commands::Migrate => {}
        Commands::LoginLink { email, send } => {
            let issued = app.auth.generate_login_token(&email).await?;
            let link = app.auth.build_magic_link(&issued.raw_token);
            if send {
                let mailer = SmtpMailer::from_config(&app.config.smtp)?;
                app.auth.send_magic_link(&mailer, &issued).await?;
                print_json(&serde_json::json!({
                    "sent": true,
                    "email": issued.principal.email,
                    "expires_at": issued.expires_at,
                }))?;
            } else {
                print_json(&serde_json::json!({
                    "email": issued.principal.email,
                    "role": issued.principal.role,
                    "link": link,
                    "expires_at": issued.expires_at,
                }))?;
            }
        }
        Commands::VerifyToken { token } => match app.auth.verify_login_token(&token).await {
            Ok(principal) => print_json(&principal)?,
            Err(e) => bail!(e.client_message()),
        },
        Commands::SetRole { actor, email, role } => {
            let actor = app.principal(&actor).await?;
            let target = app.principal(&email).await?;
            let updated = app
                .auth
                .set_role(&actor, target.id, role)
                .await
                .map_err(|e| anyhow::anyhow!(e.client_message()))?;
            print_json(&updated)?;
        }
        Commands::Secret { sub } => run_secret(&app, sub).await?,
        Commands::Upload { email, files } => {
            let principal = app.principal(&email).await?;
            let documents = app.documents().await?;
            let mut receipts = Vec::with_capacity(files.len());
            for file in read_files(&files).await? {
                receipts.push(
                    documents
                        .upload(&principal, &file.name, file.bytes.to_vec())
                        .await?,
                );
            }
            print_json(&receipts)?;
        }
        Commands::Documents { email } => {
            let principal = app.principal(&email).await?;
            let documents = app.documents().await?;
            print_json(&documents.list_documents(principal.tenant_id).await?)?;
        }
        Commands::Plan {
            email,
            files,
            instructions,
        } => run_plan(&app, &email, &files, instructions.as_deref()).await?,
        Commands::Report { email, board } => run_report(&app, &email, &board).await?,
        Commands::Chat { email, files } => run_chat(&app, &email, &files).await?,
    }

    Ok(())
}

async fn run_secret(app: &App, sub: SecretCommands) -> anyhow::Result<()> {
    match sub {
        SecretCommands::Set {
            scope,
            key,
            value,
            email,
        } => {
            let principal = app.principal(&email).await?;
            let scope = match scope {
                ScopeArg::User => SecretScope::Principal(principal.id),
                ScopeArg::Company if principal.is_admin() => {
                    SecretScope::Tenant(principal.tenant_id)
                }
                ScopeArg::Company => {
                    bail!("Only company administrators can save company credentials")
                }
            };
            app.secrets.set(scope, key.as_str(), &value).await?;
            print_json(&serde_json::json!({
                "saved": true,
                "key": key,
                "scope": scope.label(),
            }))?;
        }
        SecretCommands::Resolve { email, key } => {
            let principal = app.principal(&email).await?;
            let keys = match key {
                Some(key) => vec![key],
                None => CredentialKey::ALL.to_vec(),
            };
            let mut rows = Vec::with_capacity(keys.len());
            for key in keys {
                let resolved = app.resolver.resolve(&principal, key).await;
                rows.push(serde_json::json!({
                    "key": key,
                    "configured": resolved.is_some(),
                    "scope": resolved.as_ref().map(|c| c.scope.label()),
                    "value": resolved.as_ref().map(|c| mask_secret(&c.value)),
                }));
            }
            print_json(&rows)?;
        }
    }
    Ok(())
}

fn print_file_details(details: &[FileDetail]) {
    for detail in details {
        eprintln!("  {}: {}", detail.name, detail.status);
    }
}

async fn write_artifact(app: &App, kind: ArtifactKind, content: &str) -> anyhow::Result<()> {
    let writer = app.artifact_writer();
    let content = content.to_string();
    let outputs: ArtifactOutputs =
        tokio::task::spawn_blocking(move || writer.write(kind, &content))
            .await
            .context("Artifact rendering task failed")??;
    for file in outputs.written() {
        let note = if file.placeholder { " (placeholder)" } else { "" };
        eprintln!("  wrote {}{}", file.path.display(), note);
    }
    for (format, error) in outputs.failures() {
        eprintln!("  {:?} not written: {}", format, error);
    }
    Ok(())
}

/// Direct path: whole extracted text, no retrieval.
async fn run_plan(
    app: &App,
    email: &str,
    paths: &[PathBuf],
    instructions: Option<&str>,
) -> anyhow::Result<()> {
    let principal = app.principal(email).await?;
    let context = app.agent_context(&principal).await;
    let Some(llm) = context.llm() else {
        bail!(LLM_NOT_CONFIGURED);
    };

    let files = read_files(paths).await?;
    let batch = process_files(&files).await;
    eprintln!("Processed {} file(s):", files.len());
    print_file_details(&batch.file_details);
    if batch.documents.is_empty() {
        bail!("No readable document content found in the provided files");
    }

    let text = with_instructions(batch.combined_text, instructions);
    let plan = generate_project_plan(&**llm, &text, context.temperature()).await?;
    println!("{}", plan);
    write_artifact(app, ArtifactKind::Plan, &plan).await
}

async fn run_report(app: &App, email: &str, board: &str) -> anyhow::Result<()> {
    let principal = app.principal(email).await?;
    let context = app.agent_context(&principal).await;
    let Some(client) = context.board() else {
        bail!(TRELLO_NOT_CONFIGURED);
    };
    let Some(llm) = context.llm() else {
        bail!(LLM_NOT_CONFIGURED);
    };

    let data = client.fetch_board(board).await?;
    let report = generate_status_report(
        &**llm,
        &data,
        Local::now().date_naive(),
        context.temperature(),
    )
    .await?;
    println!("{}", report);
    write_artifact(app, ArtifactKind::Report, &report).await
}

async fn run_chat(app: &App, email: &str, paths: &[PathBuf]) -> anyhow::Result<()> {
    let principal = app.principal(email).await?;
    let context = app.agent_context(&principal).await;
    let indexer = context.indexer(app.chunk_config());
    let agent = Agent::new(context);
    let mut session = ChatSession::new(Some(app.artifact_writer()));

    let files = read_files(paths).await?;
    if !files.is_empty() {
        match &indexer {
            Some(indexer) => {
                let report = indexer.ensure_index(&mut session.vector_index, &files).await;
                eprintln!(
                    "Indexed {} chunk(s) from {} file(s) ({} dropped)",
                    report.embedded,
                    files.len(),
                    report.dropped
                );
                print_file_details(&report.file_details);
            }
            None => eprintln!("{}", LLM_NOT_CONFIGURED),
        }
    }

    tracing::info!(session_id = %session.id, user_id = %principal.id, "Chat session started");
    eprintln!(
        "Type a message. /clear forgets the conversation, /reset also drops documents, /quit exits."
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("you> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let message = line.trim();
        match message {
            "" => continue,
            "/quit" | "/exit" => break,
            "/clear" => {
                session.clear_history();
                eprintln!("Chat history cleared.");
                continue;
            }
            "/reset" => {
                session.reset();
                eprintln!("Chat history and document index cleared.");
                continue;
            }
            _ => {}
        }

        match agent.run_turn(&mut session, message).await {
            Ok(outcome) => {
                println!("mira> {}", outcome.reply);
                for (generated, kind) in [
                    (outcome.plan_generated, ArtifactKind::Plan),
                    (outcome.report_generated, ArtifactKind::Report),
                ] {
                    if generated {
                        eprintln!("{} saved:", kind.title());
                        for file in session.artifacts.files(kind) {
                            eprintln!("  {}", file.path.display());
                        }
                    }
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, code = e.error_code(), "Agent turn failed");
                eprintln!("mira> {}", truncate_string(&e.client_message(), 200));
                if let Some(action) = e.suggested_action() {
                    eprintln!("      {}", action);
                }
            }
        }
    }
    Ok(())
}
