use colored::*;
use unit4::patterns::is_valid_cost_code;
use unit4::Operator;

use crate::worklog::RemoteWorklog;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CostCodeAnswer {
    CostCode(String),
    Skip,
}

/// Ask for the cost-code of an unmapped worklog's account.
///
/// An empty answer, `SKIP` or closed input skips the worklog; anything that
/// is not a cost-code is rejected and asked again.
pub async fn ask_cost_code(operator: &dyn Operator, worklog: &RemoteWorklog) -> CostCodeAnswer {
    println!();
    println!(
        "  {} {} ({})",
        "Unknown account:".yellow().bold(),
        worklog.account_key.as_deref().unwrap_or("-"),
        worklog.account_name.as_deref().unwrap_or("?")
    );
    println!("    Ticket:  {}", worklog.issue_key);
    println!(
        "    Summary: {}",
        worklog.issue_summary.chars().take(60).collect::<String>()
    );

    loop {
        let answer = match operator
            .ask("  Enter cost-code (e.g., 1234-56789-001) or SKIP")
            .await
        {
            Some(answer) => answer.trim().to_string(),
            None => return CostCodeAnswer::Skip,
        };
        if answer.is_empty() || answer.eq_ignore_ascii_case("skip") {
            return CostCodeAnswer::Skip;
        }
        if is_valid_cost_code(&answer) {
            return CostCodeAnswer::CostCode(answer);
        }
        println!(
            "  {} Invalid format '{}', expected XXXX-XXXXX-XXX",
            "[!]".red(),
            answer
        );
    }
}
