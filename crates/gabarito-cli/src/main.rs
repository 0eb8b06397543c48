//! gabarito CLI — the user-facing command-line interface.

use std::path::PathBuf;
use std::process;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "gabarito", version, about = "Exam authoring and correction client")]
struct Cli {
    /// Config file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a starter config file
    Init,

    /// Log in and store the session
    Login {
        #[arg(long)]
        email: String,

        #[arg(long)]
        password: String,
    },

    /// Create an account and log in
    Register {
        #[arg(long)]
        name: String,

        #[arg(long)]
        email: String,

        #[arg(long)]
        password: String,

        /// professor or aluno
        #[arg(long, default_value = "aluno")]
        role: String,
    },

    /// End the session
    Logout,

    /// Show the logged-in user
    Whoami,

    /// List, inspect and manage exams
    #[command(subcommand)]
    Exams(ExamsCommand),

    /// Manage the questions of a draft exam
    #[command(subcommand)]
    Questions(QuestionsCommand),

    /// Show or set an exam's answer key
    #[command(subcommand)]
    AnswerKey(AnswerKeyCommand),

    /// Submit answers to a published exam
    Submit {
        exam_id: String,

        /// Answer as QUESTION=ALTERNATIVE; QUESTION may be an id or the question number
        #[arg(long = "answer", short = 'a')]
        answers: Vec<String>,
    },

    /// Correct a submission
    Correct { submission_id: String },

    /// Show the correction result of a submission
    Result {
        submission_id: String,

        /// Keep polling while the correction is pending
        #[arg(long)]
        wait: bool,

        /// Polling attempts with --wait
        #[arg(long, default_value = "10")]
        attempts: u32,

        /// Seconds between polls with --wait
        #[arg(long, default_value = "2")]
        interval: u64,
    },

    /// Show an exam's grade report and statistics
    Report {
        exam_id: String,

        /// Only show per-question statistics
        #[arg(long)]
        statistics: bool,
    },

    /// List or register issues on a question
    #[command(subcommand)]
    Issues(IssuesCommand),
}

#[derive(Subcommand)]
enum ExamsCommand {
    /// List the exams you can see
    List,

    /// Show an exam with its questions, submissions and available actions
    Show { exam_id: String },

    /// Create a draft exam
    Create {
        #[arg(long)]
        title: String,

        #[arg(long)]
        description: Option<String>,

        /// Submission window start (RFC 3339)
        #[arg(long)]
        start: Option<DateTime<Utc>>,

        /// Submission window end (RFC 3339)
        #[arg(long)]
        end: Option<DateTime<Utc>>,
    },

    /// Edit a draft exam's details
    Edit {
        exam_id: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        start: Option<DateTime<Utc>>,

        #[arg(long)]
        end: Option<DateTime<Utc>>,
    },

    /// Delete a draft exam
    Delete { exam_id: String },

    /// Publish a draft exam
    Publish { exam_id: String },

    /// Close a published exam
    Close { exam_id: String },
}

#[derive(Subcommand)]
enum QuestionsCommand {
    /// List an exam's questions in order
    List { exam_id: String },

    /// Add a question to a draft exam
    Add {
        exam_id: String,

        #[arg(long)]
        statement: String,

        /// objetiva, verdadeiro_falso or dissertativa
        #[arg(long = "type", default_value = "objetiva")]
        kind: String,

        /// Alternative (repeatable)
        #[arg(long = "alternative")]
        alternatives: Vec<String>,

        #[arg(long, default_value = "1.0")]
        score: f64,

        /// Position in the exam (default: last)
        #[arg(long)]
        order: Option<u32>,
    },

    /// Update a question of a draft exam
    Update {
        exam_id: String,
        question_id: String,

        #[arg(long)]
        statement: Option<String>,

        #[arg(long = "type")]
        kind: Option<String>,

        /// Replaces all alternatives when given (repeatable)
        #[arg(long = "alternative")]
        alternatives: Vec<String>,

        #[arg(long)]
        score: Option<f64>,

        #[arg(long)]
        order: Option<u32>,
    },

    /// Remove a question from a draft exam
    Remove { exam_id: String, question_id: String },
}

#[derive(Subcommand)]
enum AnswerKeyCommand {
    /// Show the answer key
    Show { exam_id: String },

    /// Create or replace the answer key
    Set {
        exam_id: String,

        /// Answer as QUESTION=ALTERNATIVE; QUESTION may be an id or the question number
        #[arg(long = "answer", short = 'a')]
        answers: Vec<String>,
    },
}

#[derive(Subcommand)]
enum IssuesCommand {
    /// List the issues registered on a question
    List { exam_id: String, question_id: String },

    /// Register an issue on a question
    Add {
        exam_id: String,
        question_id: String,

        /// Problem type, e.g. "ambígua"
        #[arg(long = "type")]
        problem_type: String,

        /// baixa, media or alta
        #[arg(long, default_value = "media")]
        severity: String,

        #[arg(long)]
        description: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("gabarito=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.config;

    let result = match cli.command {
        Commands::Init => commands::init::execute(),
        Commands::Login { email, password } => {
            commands::auth::login(config, email, password).await
        }
        Commands::Register {
            name,
            email,
            password,
            role,
        } => commands::auth::register(config, name, email, password, role).await,
        Commands::Logout => commands::auth::logout(config).await,
        Commands::Whoami => commands::auth::whoami(config).await,
        Commands::Exams(cmd) => match cmd {
            ExamsCommand::List => commands::exams::list(config).await,
            ExamsCommand::Show { exam_id } => commands::exams::show(config, exam_id).await,
            ExamsCommand::Create {
                title,
                description,
                start,
                end,
            } => commands::exams::create(config, title, description, start, end).await,
            ExamsCommand::Edit {
                exam_id,
                title,
                description,
                start,
                end,
            } => commands::exams::edit(config, exam_id, title, description, start, end).await,
            ExamsCommand::Delete { exam_id } => commands::exams::delete(config, exam_id).await,
            ExamsCommand::Publish { exam_id } => commands::exams::publish(config, exam_id).await,
            ExamsCommand::Close { exam_id } => commands::exams::close(config, exam_id).await,
        },
        Commands::Questions(cmd) => match cmd {
            QuestionsCommand::List { exam_id } => commands::questions::list(config, exam_id).await,
            QuestionsCommand::Add {
                exam_id,
                statement,
                kind,
                alternatives,
                score,
                order,
            } => {
                commands::questions::add(
                    config,
                    exam_id,
                    statement,
                    kind,
                    alternatives,
                    score,
                    order,
                )
                .await
            }
            QuestionsCommand::Update {
                exam_id,
                question_id,
                statement,
                kind,
                alternatives,
                score,
                order,
            } => {
                commands::questions::update(
                    config,
                    exam_id,
                    question_id,
                    commands::questions::QuestionEdit {
                        statement,
                        kind,
                        alternatives,
                        score,
                        order,
                    },
                )
                .await
            }
            QuestionsCommand::Remove {
                exam_id,
                question_id,
            } => commands::questions::remove(config, exam_id, question_id).await,
        },
        Commands::AnswerKey(cmd) => match cmd {
            AnswerKeyCommand::Show { exam_id } => {
                commands::answer_key::show(config, exam_id).await
            }
            AnswerKeyCommand::Set { exam_id, answers } => {
                commands::answer_key::set(config, exam_id, answers).await
            }
        },
        Commands::Submit { exam_id, answers } => {
            commands::submissions::submit(config, exam_id, answers).await
        }
        Commands::Correct { submission_id } => {
            commands::submissions::correct(config, submission_id).await
        }
        Commands::Result {
            submission_id,
            wait,
            attempts,
            interval,
        } => commands::submissions::result(config, submission_id, wait, attempts, interval).await,
        Commands::Report {
            exam_id,
            statistics,
        } => commands::report::execute(config, exam_id, statistics).await,
        Commands::Issues(cmd) => match cmd {
            IssuesCommand::List {
                exam_id,
                question_id,
            } => commands::issues::list(config, exam_id, question_id).await,
            IssuesCommand::Add {
                exam_id,
                question_id,
                problem_type,
                severity,
                description,
            } => {
                commands::issues::add(
                    config,
                    exam_id,
                    question_id,
                    problem_type,
                    severity,
                    description,
                )
                .await
            }
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
