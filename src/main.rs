mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use colored::*;
use std::{path::Path, sync::Arc};
use school_ledger::{
    config::Config,
    error::{self, PortalError},
    grading::{GradeEvaluator, GradeResult},
    payments::{
        import, FeeCategory, ManualPayment, PaymentMethod, PaymentReconciler,
    },
    storage::{models::NewStudent, MemoryStore, SqliteStore, StudentStore},
    utils,
};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "school_ledger=debug,info".into()),
        )
        .init();

    let cli = Cli::parse();

    let config = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Init => {
            info!("Initializing...");
            initialize(&config, &cli.config).await
        }

        Commands::Grade { score, mid, end } => grade(&config, score, mid, end),

        Commands::Distribution { scores } => distribution(&config, &scores),

        Commands::Scale => show_scale(&config),

        Commands::Enroll { name, owed, provider_id } => {
            enroll(&config, name, owed, provider_id).await
        }

        Commands::SyncCodes { file, dry_run } => {
            info!("Syncing payment codes from {}", file.display());
            sync_codes(&config, &file, dry_run).await
        }

        Commands::Reconcile { file, yes, dry_run, format } => {
            info!("Reconciling transactions from {}", file.display());
            reconcile(&config, &file, yes, dry_run, &format).await
        }

        Commands::Pay { student_id, amount, fee_type, method, date, reference } => {
            let payment = ManualPayment {
                amount,
                category: FeeCategory::from_raw(&fee_type),
                method: PaymentMethod::from_raw(&method),
                paid_date: date.unwrap_or_else(|| chrono::Local::now().date_naive()),
                reference,
                description: None,
            };
            record_payment(&config, student_id, &payment).await
        }

        Commands::Student { id } => show_student(&config, id).await,

        Commands::Analytics { format } => {
            info!("Generating payment analytics...");
            show_analytics(&config, &format).await
        }
    };

    if let Err(e) = result {
        error!("{}", format!("Error: {}", e).red());
        std::process::exit(1);
    }
}

fn open_store(config: &Config) -> error::Result<Arc<dyn StudentStore>> {
    Ok(Arc::new(SqliteStore::new(&config.database.path)?))
}

/// Copy the current students into a scratch store so nothing is written
async fn dry_run_store(config: &Config) -> error::Result<Arc<dyn StudentStore>> {
    let students = open_store(config)?.list_students().await?;
    info!("Dry run against {} students", students.len());
    Ok(Arc::new(MemoryStore::from_students(students)))
}

fn evaluator(config: &Config) -> error::Result<GradeEvaluator> {
    Ok(GradeEvaluator::new(config.marking_weights()?))
}

fn paint(text: &str, color_tag: &str) -> ColoredString {
    match color_tag {
        "success" => text.green(),
        "primary" => text.blue(),
        "info" => text.cyan(),
        "warning" => text.yellow(),
        _ => text.red(),
    }
}

fn print_grade(grade: &GradeResult) {
    println!(
        "Grade:        {}",
        paint(&format!("{} ({})", grade.letter, grade.label), grade.color_tag).bold()
    );
    println!("Description:  {}", grade.description);
}

fn grade(config: &Config, score: Option<f64>, mid: Option<f64>, end: Option<f64>) -> error::Result<()> {
    let evaluator = evaluator(config)?;

    let score = match (score, mid, end) {
        (Some(score), _, _) => score,
        (None, Some(mid), Some(end)) => {
            for part in [mid, end] {
                if !GradeEvaluator::is_valid_score(part) {
                    warn!("Score {} is outside 0-100", part);
                }
            }
            let weights = evaluator.weights();
            let final_score = evaluator.final_score(mid, end);
            println!(
                "Mid-term:     {} x {:.0}%",
                mid,
                weights.mid_term * 100.0
            );
            println!(
                "End-term:     {} x {:.0}%",
                end,
                weights.end_term * 100.0
            );
            println!("Final score:  {}", final_score.to_string().bold());
            final_score
        }
        _ => {
            return Err(PortalError::Other(anyhow::anyhow!(
                "Provide a score or both --mid and --end"
            )))
        }
    };

    if !GradeEvaluator::is_valid_score(score) {
        warn!("Score {} is outside 0-100", score);
    }
    print_grade(&evaluator.classify(score));
    Ok(())
}

fn distribution(config: &Config, scores: &[f64]) -> error::Result<()> {
    let evaluator = evaluator(config)?;
    let distribution = evaluator.distribution(scores);

    println!("{}", "=== Grade Distribution ===".cyan().bold());
    utils::print_table_border(40);
    utils::print_table_row(&["Grade", "Range", "Count"], &[8, 14, 8]);
    utils::print_table_border(40);
    for (letter, count) in distribution.iter() {
        utils::print_table_row(
            &[
                letter.as_str(),
                &GradeEvaluator::band_range(letter),
                &count.to_string(),
            ],
            &[8, 14, 8],
        );
    }
    utils::print_table_border(40);
    println!("Total:  {}", distribution.total());
    Ok(())
}

fn show_scale(config: &Config) -> error::Result<()> {
    let evaluator = evaluator(config)?;

    println!("{}", "=== Grading Scale ===".cyan().bold());
    for band in evaluator.bands() {
        println!(
            "  {}  {:<10}  {:<12}  {}",
            paint(band.letter.as_str(), band.color_tag).bold(),
            GradeEvaluator::band_range(band.letter),
            band.label,
            band.description
        );
    }
    Ok(())
}

async fn enroll(
    config: &Config,
    name: String,
    owed: f64,
    provider_id: Option<String>,
) -> error::Result<()> {
    if !owed.is_finite() || owed < 0.0 {
        return Err(PortalError::InvalidAmount(owed.to_string()));
    }

    let store = open_store(config)?;
    let id = store
        .insert_student(&NewStudent {
            full_name: name.clone(),
            provider_student_id: provider_id,
            total_fees_owed: owed,
        })
        .await?;

    println!("{}", format!("✓ Enrolled {} with id {}", name, id).green());
    println!(
        "  Fees owed:  {}",
        utils::format_currency(owed, &config.reconcile.currency)
    );
    Ok(())
}

async fn sync_codes(config: &Config, file: &Path, dry_run: bool) -> error::Result<()> {
    let entries = import::read_payment_code_file(file)?;
    println!("Read {} payment codes from {}", entries.len(), file.display());

    let store = if dry_run {
        dry_run_store(config).await?
    } else {
        open_store(config)?
    };

    let reconciler = PaymentReconciler::new(store, config.portal_context());
    let outcome = reconciler.sync_identifiers(&entries).await;
    outcome.print_summary();

    if dry_run {
        println!("\n{}", "DRY RUN: No payment codes were saved".yellow());
    }
    Ok(())
}

async fn reconcile(
    config: &Config,
    file: &Path,
    yes: bool,
    dry_run: bool,
    format: &str,
) -> error::Result<()> {
    let rows = import::read_transaction_file(file)?;
    let source_name = file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.display().to_string());

    if !yes && !dry_run && format != "json" {
        let prompt = format!("Import {} transactions from {}?", rows.len(), source_name);
        if !utils::confirm_action(&prompt) {
            println!("Cancelled");
            return Ok(());
        }
    }

    let store = if dry_run {
        dry_run_store(config).await?
    } else {
        open_store(config)?
    };

    let reconciler = PaymentReconciler::new(store, config.portal_context());
    let outcome = reconciler.reconcile_import(&source_name, &rows).await?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    outcome.print_summary(&reconciler.context().currency);
    if dry_run {
        println!("\n{}", "DRY RUN: No balances were changed".yellow());
    }
    Ok(())
}

async fn record_payment(
    config: &Config,
    student_id: i64,
    payment: &ManualPayment,
) -> error::Result<()> {
    let store = open_store(config)?;
    let student = store
        .get_student(student_id)
        .await?
        .ok_or_else(|| PortalError::StudentNotFound(student_id.to_string()))?;

    let reconciler = PaymentReconciler::new(store, config.portal_context());
    let financial = reconciler.record_manual_payment(student_id, payment).await?;
    let currency = &config.reconcile.currency;

    println!("{}", format!("✓ Payment recorded for {}", student.full_name).green());
    println!("  Paid:     {}", utils::format_currency(payment.amount, currency));
    println!("  Balance:  {}", utils::format_currency(financial.current_balance, currency));
    println!("  Status:   {}", financial.payment_status);
    Ok(())
}

async fn show_student(config: &Config, id: i64) -> error::Result<()> {
    let store = open_store(config)?;
    let student = store
        .get_student(id)
        .await?
        .ok_or_else(|| PortalError::StudentNotFound(id.to_string()))?;
    let currency = &config.reconcile.currency;
    let financial = &student.financial;

    println!("{}", format!("=== {} ===", student.full_name).cyan().bold());
    println!("  Id:            {}", student.id);
    println!(
        "  Provider id:   {}",
        student.provider_student_id.as_deref().unwrap_or("-")
    );
    println!(
        "  Payment code:  {}",
        student.payment_code.as_deref().unwrap_or("-")
    );
    if let Some(synced) = &student.integration.last_sync_date {
        println!("  Last sync:     {}", utils::format_timestamp(synced));
    }

    println!("\nFees:");
    println!("  Owed:     {}", utils::format_currency(financial.total_fees_owed, currency));
    println!("  Paid:     {}", utils::format_currency(financial.total_fees_paid, currency));
    println!("  Balance:  {}", utils::format_currency(financial.current_balance, currency));
    println!("  Status:   {}", financial.payment_status);
    if let Some(last) = financial.last_payment_date {
        println!("  Last:     {}", last);
    }
    Ok(())
}

async fn show_analytics(config: &Config, format: &str) -> error::Result<()> {
    let reconciler = PaymentReconciler::new(open_store(config)?, config.portal_context());
    let analytics = reconciler.payment_analytics().await?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&analytics)?);
        return Ok(());
    }

    let currency = &config.reconcile.currency;
    println!("{}", "=== Payment Analytics ===".cyan().bold());
    println!("Total collected:    {}", utils::format_currency(analytics.total_amount, currency));
    println!(
        "Via School Pay:     {}",
        analytics.external_payment_count.to_string().green()
    );

    println!("\nBy payment method:");
    for (method, count) in &analytics.payment_method_counts {
        println!("  {:<16} {}", method.as_str(), count);
    }

    println!("\nBy fee type:");
    for (category, count) in &analytics.fee_type_counts {
        println!("  {:<16} {}", category.as_str(), count);
    }

    if !analytics.monthly_totals.is_empty() {
        println!("\n{}", "Monthly totals:".yellow());
        utils::print_table_border(40);
        utils::print_table_row(&["Month", "Amount"], &[10, 24]);
        utils::print_table_border(40);
        for (month, total) in &analytics.monthly_totals {
            utils::print_table_row(&[month.as_str(), &utils::group_thousands(*total)], &[10, 24]);
        }
        utils::print_table_border(40);
    }
    Ok(())
}

async fn initialize(config: &Config, config_path: &str) -> error::Result<()> {
    println!("{}", "Initializing school ledger...".green());
    if config.write_if_missing(Path::new(config_path))? {
        println!("{}", format!("✓ Wrote default configuration to {}", config_path).green());
    } else {
        println!("{}", "✓ Configuration loaded".green());
    }
    let _store = SqliteStore::new(&config.database.path)?;
    println!("{}", "✓ Database initialized".green());

    let weights = config.marking_weights()?;
    println!("\n{}", "Configuration:".cyan());
    println!("  Database:       {}", config.database.path);
    println!("  Mid-term:       {:.0}%", weights.mid_term * 100.0);
    println!("  End-term:       {:.0}%", weights.end_term * 100.0);
    println!("  Operator:       {}", config.reconcile.operator);
    println!("  Currency:       {}", config.reconcile.currency);

    println!("\n{}", "Ready to use! Try running:".cyan());
    println!("  {} to enroll a student", "school-ledger enroll --name \"Jane Doe\" --owed 500000".yellow());
    println!("  {} to import School Pay transactions", "school-ledger reconcile export.csv".yellow());
    println!("  {} to view payment analytics", "school-ledger analytics".yellow());
    Ok(())
}
