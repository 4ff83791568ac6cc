//! Recurring transaction display formatting

use super::{amount_cell, note_cell, truncate};
use crate::config::Settings;
use crate::services::{calculate_next_date, RecurringView};

fn next_cell(view: &RecurringView, settings: &Settings) -> String {
    match calculate_next_date(&view.record) {
        Some(date) => date.format(&settings.date_format).to_string(),
        None if !view.record.is_active => "paused".to_string(),
        None => "ended".to_string(),
    }
}

/// Format recurring transactions as a table
pub fn format_recurring_list(views: &[RecurringView], settings: &Settings) -> String {
    if views.is_empty() {
        return "No recurring transactions found.\n".to_string();
    }

    let mut output = String::new();
    output.push_str(&format!(
        "{:2} {:>3} {:>12} {:20} {:10} {}\n",
        "", "Day", "Amount", "Note", "Next", "ID"
    ));
    output.push_str(&"-".repeat(64));
    output.push('\n');

    for view in views {
        let rec = &view.record;
        output.push_str(&format!(
            "{} {:>3} {:>12} {:20} {:10} {}\n",
            if rec.is_encrypted() { "🔒" } else { "  " },
            rec.original_day,
            amount_cell(view.amount, view.access, settings),
            truncate(&note_cell(view.note.as_deref(), view.access), 20),
            next_cell(view, settings),
            rec.id
        ));
    }

    output
}

/// Format one recurring transaction in detail
pub fn format_recurring_details(view: &RecurringView, settings: &Settings) -> String {
    let rec = &view.record;
    let mut output = String::new();

    output.push_str(&format!("Recurring:   {}\n", rec.id));
    output.push_str(&format!(
        "Amount:      {}\n",
        amount_cell(view.amount, view.access, settings)
    ));
    output.push_str(&format!(
        "Note:        {}\n",
        note_cell(view.note.as_deref(), view.access)
    ));
    output.push_str(&format!("Day:         {}\n", rec.original_day));
    output.push_str(&format!(
        "Starts:      {}\n",
        rec.start_date.format(&settings.date_format)
    ));
    if let Some(end) = rec.end_date {
        output.push_str(&format!(
            "Ends:        {}\n",
            end.format(&settings.date_format)
        ));
    }
    if let Some(last) = rec.last_generated {
        output.push_str(&format!(
            "Last run:    {}\n",
            last.format(&settings.date_format)
        ));
    }
    output.push_str(&format!("Next:        {}\n", next_cell(view, settings)));
    output.push_str(&format!(
        "Active:      {}\n",
        if rec.is_active { "yes" } else { "no" }
    ));

    output
}
