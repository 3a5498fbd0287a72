use qhop_core::{MigrationResult, QueueDescriptor};
use std::fmt::Write as _;

/// Left-aligned columns separated by two spaces; the last column is not padded.
fn table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    let mut out = String::new();
    let _ = writeln!(out, "{}", table_line(&widths, headers.iter().copied()));
    let rule = widths.iter().sum::<usize>() + 2 * widths.len().saturating_sub(1);
    let _ = writeln!(out, "{}", "-".repeat(rule));
    for row in rows {
        let _ = writeln!(out, "{}", table_line(&widths, row.iter().map(String::as_str)));
    }
    out
}

fn table_line<'a>(widths: &[usize], cells: impl Iterator<Item = &'a str>) -> String {
    let last = widths.len().saturating_sub(1);
    let mut out = String::new();
    for (i, cell) in cells.enumerate() {
        if i >= last {
            out.push_str(cell);
        } else {
            let _ = write!(out, "{:<w$}  ", cell, w = widths[i]);
        }
    }
    out.trim_end().to_string()
}

pub(crate) fn queue_table(queues: &[QueueDescriptor]) -> String {
    let rows: Vec<Vec<String>> = queues
        .iter()
        .map(|q| {
            vec![
                q.name.clone(),
                q.vhost.clone(),
                q.current_type.to_string(),
                q.durable.to_string(),
                q.message_count.to_string(),
                q.policy.clone().unwrap_or_else(|| "-".to_string()),
            ]
        })
        .collect();
    let mut out = table(
        &["Queue Name", "Vhost", "Type", "Durable", "Messages", "Policy"],
        &rows,
    );
    let _ = writeln!(out, "\nTotal queues: {}", queues.len());
    out
}

/// What the operator needs to know about a result: why it was skipped, where
/// it failed and whether the temp queue still holds messages, or any advisory.
fn detail(result: &MigrationResult) -> String {
    if let Some(error) = &result.error {
        let temp = match (result.temp_queue_exists, result.temp_queue_messages) {
            (false, _) => "no temp queue".to_string(),
            (true, Some(0)) => format!("{} is empty", result.temp_queue),
            (true, Some(n)) => format!("{} holds {} message(s)", result.temp_queue, n),
            (true, None) => format!("{} exists, depth unknown", result.temp_queue),
        };
        return format!("failed in {}: {} ({})", error.phase, error.message, temp);
    }
    if result.is_blocked() {
        return format!("blocked: {}", result.plan.reason());
    }
    if result.advisories.is_empty() {
        "-".to_string()
    } else {
        result.advisories.join("; ")
    }
}

pub(crate) fn result_table(results: &[MigrationResult]) -> String {
    let rows: Vec<Vec<String>> = results
        .iter()
        .map(|r| {
            vec![
                r.queue.clone(),
                r.vhost.clone(),
                r.target_type.to_string(),
                r.phase.as_str().to_string(),
                r.messages_moved_out.to_string(),
                r.messages_moved_in.to_string(),
                detail(r),
            ]
        })
        .collect();
    let mut out = table(
        &["Queue Name", "Vhost", "Target", "Phase", "Out", "In", "Detail"],
        &rows,
    );

    let succeeded = results.iter().filter(|r| r.is_success()).count();
    let blocked = results.iter().filter(|r| r.is_blocked()).count();
    let failed = results.iter().filter(|r| r.error.is_some()).count();
    let _ = writeln!(
        out,
        "\nTotal queues: {}  Succeeded: {}  Blocked: {}  Failed: {}",
        results.len(),
        succeeded,
        blocked,
        failed
    );
    out
}
