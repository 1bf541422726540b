use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "embr",
    about = "EmbeddingBridge: version and share embedding vectors",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Initialize a new repository
    Init(InitArgs),
    /// Store an embedding file in the current set
    Store(StoreArgs),
    /// Expand a hash prefix to the full object hash
    Resolve(ResolveArgs),
    /// Print the vector stored under a hash
    Cat(CatArgs),
    /// Show the log of a set
    Log(LogArgs),
    /// List sets, or switch to one
    Set(SetArgs),
    /// Manage remotes
    Remote(RemoteArgs),
    /// Push a set to a remote
    Push(PushArgs),
    /// Pull a set from an S3 remote
    Pull(PullArgs),
    /// List what a remote stores for a set
    LsRemote(LsRemoteArgs),
    /// Stop tracking a source file's embeddings
    Rm(RmArgs),
    /// Delete objects no set refers to
    Gc(GcArgs),
}

#[derive(Args)]
pub struct InitArgs {
    pub path: Option<String>,
}

#[derive(Args)]
pub struct StoreArgs {
    /// `.npy` or raw float32 file
    pub file: String,
    #[arg(short, long)]
    pub model: String,
    /// Source document the embedding was computed from; defaults to `file`
    #[arg(short, long)]
    pub source: Option<String>,
}

#[derive(Args)]
pub struct ResolveArgs {
    pub prefix: String,
}

#[derive(Args)]
pub struct CatArgs {
    pub prefix: String,
    /// Write the raw float32 bytes instead of text
    #[arg(long)]
    pub raw: bool,
}

#[derive(Args)]
pub struct LogArgs {
    #[arg(short = 'n', long, default_value = "20")]
    pub limit: usize,
    #[arg(long)]
    pub set: Option<String>,
    #[arg(long)]
    pub oneline: bool,
}

#[derive(Args)]
pub struct SetArgs {
    pub name: Option<String>,
}

#[derive(Args)]
pub struct RemoteArgs {
    #[command(subcommand)]
    pub action: Option<RemoteAction>,
}

#[derive(Subcommand)]
pub enum RemoteAction {
    Add {
        name: String,
        url: String,
        /// Deadline in seconds for every operation on this remote
        #[arg(long)]
        timeout: Option<u64>,
        #[arg(long)]
        transformer: Option<String>,
    },
    Remove {
        name: String,
    },
    List,
}

#[derive(Args)]
pub struct PushArgs {
    pub remote: Option<String>,
    pub set: Option<String>,
    /// Delete remote documents the local set does not have
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Args)]
pub struct PullArgs {
    pub remote: Option<String>,
    pub set: Option<String>,
}

#[derive(Args)]
pub struct LsRemoteArgs {
    pub remote: Option<String>,
    pub set: Option<String>,
}

#[derive(Args)]
pub struct RmArgs {
    pub source: String,
    /// Only remove the embedding made by this model
    #[arg(short, long)]
    pub model: Option<String>,
    /// Only remove from the index; keep objects and log entries
    #[arg(long)]
    pub cached: bool,
    #[arg(long)]
    pub set: Option<String>,
}

#[derive(Args)]
pub struct GcArgs {
    /// `now`, `never`, or `<n>.<unit>.ago`; defaults to two weeks
    #[arg(long)]
    pub prune: Option<String>,
}
