use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "school-ledger")]
#[command(about = "Grading and School Pay reconciliation for the school portal")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, global = true, default_value = "config/default.toml")]
    pub config: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize database and configuration
    Init,

    /// Grade a single score, or a mid-term/end-term pair
    Grade {
        /// Score to classify
        #[arg(
            allow_negative_numbers = true,
            conflicts_with_all = ["mid", "end"],
            required_unless_present_all = ["mid", "end"]
        )]
        score: Option<f64>,

        /// Mid-term score
        #[arg(long, requires = "end", allow_negative_numbers = true)]
        mid: Option<f64>,

        /// End-term score
        #[arg(long, requires = "mid", allow_negative_numbers = true)]
        end: Option<f64>,
    },

    /// Count scores per letter grade
    Distribution {
        /// Scores to classify
        #[arg(required = true, allow_negative_numbers = true)]
        scores: Vec<f64>,
    },

    /// Show the grading scale
    Scale,

    /// Enroll a student
    Enroll {
        /// Full name as it appears on provider exports
        #[arg(short, long)]
        name: String,

        /// Total fees owed for the term
        #[arg(short, long)]
        owed: f64,

        /// Provider-issued student identifier
        #[arg(short, long)]
        provider_id: Option<String>,
    },

    /// Attach provider payment codes to students
    SyncCodes {
        /// Payment code export (CSV)
        file: PathBuf,

        /// Resolve against a copy of the data without saving
        #[arg(long)]
        dry_run: bool,
    },

    /// Import a provider transaction export
    Reconcile {
        /// Transaction export (CSV)
        file: PathBuf,

        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,

        /// Resolve against a copy of the data without saving
        #[arg(long)]
        dry_run: bool,

        /// Output format: table or json
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Record a payment taken at the bursar's desk
    Pay {
        /// Student id
        student_id: i64,

        /// Amount paid
        amount: f64,

        /// Fee type as named by the provider (Tuition, Meals, ...)
        #[arg(long, default_value = "Tuition")]
        fee_type: String,

        /// Payment method as named by the provider (Cash, Card, ...)
        #[arg(long, default_value = "Cash")]
        method: String,

        /// Payment date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<chrono::NaiveDate>,

        /// Receipt number
        #[arg(long)]
        reference: Option<String>,
    },

    /// Show a student's financial record
    Student {
        /// Student id
        id: i64,
    },

    /// Show payment analytics over completed payments
    Analytics {
        /// Output format: table or json
        #[arg(short, long, default_value = "table")]
        format: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grade_accepts_negative_score() {
        let cli = Cli::try_parse_from(["school-ledger", "grade", "-5"]).unwrap();
        match cli.command {
            Commands::Grade { score, mid, end } => {
                assert_eq!(score, Some(-5.0));
                assert!(mid.is_none() && end.is_none());
            }
            _ => panic!("expected grade command"),
        }
    }

    #[test]
    fn test_grade_accepts_negative_exam_scores() {
        let cli = Cli::try_parse_from(["school-ledger", "grade", "--mid", "-10", "--end", "60"]).unwrap();
        match cli.command {
            Commands::Grade { score, mid, end } => {
                assert!(score.is_none());
                assert_eq!(mid, Some(-10.0));
                assert_eq!(end, Some(60.0));
            }
            _ => panic!("expected grade command"),
        }
    }

    #[test]
    fn test_grade_requires_a_score() {
        assert!(Cli::try_parse_from(["school-ledger", "grade"]).is_err());
        assert!(Cli::try_parse_from(["school-ledger", "grade", "--mid", "50"]).is_err());
    }
}
