use clap::{Parser, Subcommand};
use std::path::PathBuf;

use answerdesk::Result;
use answerdesk::commands::{
    add_answer, add_rule, add_site, add_tenant, ask, ingest_file, list_answers, list_rules,
    list_sites, list_tenants, reembed, set_answer_enabled, set_rule_enabled, show_status,
    test_rule,
};
use answerdesk::config::{run_interactive_config, show_config};

#[derive(Parser)]
#[command(name = "answerdesk")]
#[command(about = "Multi-tenant support answer engine with curated answers, retrieval, and escalation rules")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure the embedding provider and resolver settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Manage tenants
    Tenant {
        #[command(subcommand)]
        command: TenantCommands,
    },
    /// Manage sites within a tenant
    Site {
        #[command(subcommand)]
        command: SiteCommands,
    },
    /// Manage curated answers
    Answer {
        #[command(subcommand)]
        command: AnswerCommands,
    },
    /// Manage escalation rules
    Rule {
        #[command(subcommand)]
        command: RuleCommands,
    },
    /// Ingest a UTF-8 text file into a tenant's corpus
    Ingest {
        /// Tenant slug
        tenant: String,
        /// Path of the file to ingest
        file: PathBuf,
        /// Document title (defaults to the file name)
        #[arg(long)]
        title: Option<String>,
        /// Source URL recorded for citation (defaults to a file:// URL)
        #[arg(long)]
        url: Option<String>,
        /// Site slug to scope the document to
        #[arg(long)]
        site: Option<String>,
    },
    /// Resolve a question against curated answers and the document corpus
    Ask {
        /// Tenant slug
        tenant: String,
        /// The question to resolve
        query: String,
        /// Site slug to scope the search to
        #[arg(long)]
        site: Option<String>,
        /// Maximum number of retrieved passages
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Re-embed the whole corpus after an embedding model change
    Reembed,
    /// Show per-tenant corpus and rule counts
    Status,
}

#[derive(Subcommand)]
enum TenantCommands {
    /// Register a tenant
    Add {
        /// Unique tenant slug
        slug: String,
        /// Display name
        #[arg(long)]
        name: Option<String>,
    },
    /// List all tenants
    List,
}

#[derive(Subcommand)]
enum SiteCommands {
    /// Register a site within a tenant
    Add {
        /// Tenant slug
        tenant: String,
        /// Site slug, unique within the tenant
        slug: String,
        /// Display name
        #[arg(long)]
        name: Option<String>,
    },
    /// List a tenant's sites
    List {
        /// Tenant slug
        tenant: String,
    },
}

#[derive(Subcommand)]
enum AnswerCommands {
    /// Author a curated answer
    Add {
        /// Tenant slug
        tenant: String,
        /// Trigger question
        question: String,
        /// The authored answer text
        answer: String,
        /// Higher priority wins when several answers match
        #[arg(long, default_value_t = 0)]
        priority: i64,
        /// Comma-separated trigger keywords
        #[arg(long, value_delimiter = ',')]
        keywords: Vec<String>,
        /// Comma-separated tags
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,
        /// Site slug to scope the answer to
        #[arg(long)]
        site: Option<String>,
    },
    /// List a tenant's curated answers
    List {
        /// Tenant slug
        tenant: String,
    },
    /// Re-activate a curated answer
    Enable {
        /// Answer id
        id: i64,
    },
    /// Soft-disable a curated answer
    Disable {
        /// Answer id
        id: i64,
    },
}

#[derive(Subcommand)]
enum RuleCommands {
    /// Author an escalation rule from a JSON predicate
    Add {
        /// Tenant slug
        tenant: String,
        /// Rule name
        name: String,
        /// Predicate as JSON, e.g. '{"operator":"and","conditions":[...]}'
        predicate: String,
    },
    /// List a tenant's escalation rules
    List {
        /// Tenant slug
        tenant: String,
    },
    /// Dry-run a rule against a synthetic context
    Test {
        /// Rule id
        id: i64,
        /// Message text for the context
        message: String,
        /// Confidence score for the context
        #[arg(long, default_value_t = 0.5)]
        confidence: f64,
        /// User email for the context
        #[arg(long)]
        email: Option<String>,
        /// Site id for the context
        #[arg(long)]
        site: Option<String>,
    },
    /// Enable a rule
    Enable {
        /// Rule id
        id: i64,
    },
    /// Disable a rule
    Disable {
        /// Rule id
        id: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config()?;
            } else {
                run_interactive_config()?;
            }
        }
        Commands::Tenant { command } => match command {
            TenantCommands::Add { slug, name } => add_tenant(slug, name).await?,
            TenantCommands::List => list_tenants().await?,
        },
        Commands::Site { command } => match command {
            SiteCommands::Add { tenant, slug, name } => add_site(tenant, slug, name).await?,
            SiteCommands::List { tenant } => list_sites(tenant).await?,
        },
        Commands::Answer { command } => match command {
            AnswerCommands::Add {
                tenant,
                question,
                answer,
                priority,
                keywords,
                tags,
                site,
            } => add_answer(tenant, question, answer, priority, keywords, tags, site).await?,
            AnswerCommands::List { tenant } => list_answers(tenant).await?,
            AnswerCommands::Enable { id } => set_answer_enabled(id, true).await?,
            AnswerCommands::Disable { id } => set_answer_enabled(id, false).await?,
        },
        Commands::Rule { command } => match command {
            RuleCommands::Add {
                tenant,
                name,
                predicate,
            } => add_rule(tenant, name, predicate).await?,
            RuleCommands::List { tenant } => list_rules(tenant).await?,
            RuleCommands::Test {
                id,
                message,
                confidence,
                email,
                site,
            } => test_rule(id, message, confidence, email, site).await?,
            RuleCommands::Enable { id } => set_rule_enabled(id, true).await?,
            RuleCommands::Disable { id } => set_rule_enabled(id, false).await?,
        },
        Commands::Ingest {
            tenant,
            file,
            title,
            url,
            site,
        } => ingest_file(tenant, &file, title, url, site).await?,
        Commands::Ask {
            tenant,
            query,
            site,
            limit,
        } => ask(tenant, query, site, limit).await?,
        Commands::Reembed => reembed().await?,
        Commands::Status => show_status().await?,
    }

    Ok(())
}
