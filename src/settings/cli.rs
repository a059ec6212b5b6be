use super::Parser;

#[derive(Parser, Debug)]
pub struct Cli {
    #[arg(long)]
    pub settings: Option<String>,
    /// Logged-in user id. Required; the session cannot scope a
    /// conversation without it.
    #[arg(long)]
    pub user: Option<String>,
    /// Counterpart user id; resolved through the peer directory when absent.
    #[arg(long)]
    pub peer: Option<String>,
}
