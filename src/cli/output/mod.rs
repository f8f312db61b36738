use chrono::{DateTime, Local, Utc};

use crate::{
    finance::dashboard::Activity,
    state::entities::{Task, Transaction, TransactionType},
};

const SHORT_ID_LENGTH: usize = 8;
const BAR_WIDTH: usize = 30;

pub fn format_amount(amount: f64) -> String {
    format!("₹{amount:.2}")
}

pub fn format_moment(moment: DateTime<Utc>) -> String {
    moment.with_timezone(&Local).format("%x %H:%M").to_string()
}

/// Enough of an id to be typed back in.
pub fn short_id(id: &str) -> &str {
    id.get(..SHORT_ID_LENGTH).unwrap_or(id)
}

pub fn task_line(task: &Task) -> String {
    let mut line = format!(
        "{}\t[{}]\t{:<6}\t{}",
        short_id(&task.id),
        if task.completed { "x" } else { " " },
        task.priority.to_string(),
        task.title
    );
    if let Some(due) = task.due_date {
        line.push_str(&format!("\tdue {}", format_moment(due)));
    }
    if let Some(reminder) = task.reminder_time {
        let status = if task.reminder_active() {
            ", fired"
        } else {
            ""
        };
        line.push_str(&format!("\treminder {}{status}", format_moment(reminder)));
    }
    line
}

pub fn signed_amount(transaction: &Transaction) -> String {
    match transaction.kind {
        TransactionType::Income => format!("+{}", format_amount(transaction.amount)),
        TransactionType::Expense => format!("-{}", format_amount(transaction.amount)),
    }
}

pub fn transaction_line(transaction: &Transaction) -> String {
    format!(
        "{}\t{}\t{}\t{}",
        transaction.date.with_timezone(&Local).format("%H:%M"),
        signed_amount(transaction),
        transaction.category,
        transaction.description
    )
}

pub fn activity_line(activity: &Activity) -> String {
    match activity {
        Activity::Task(task) => format!(
            "task\t{}\t{}",
            if task.completed { "done" } else { "open" },
            task.title
        ),
        Activity::Transaction(transaction) => format!(
            "{}\t{}\t{}",
            transaction.kind.to_string().to_lowercase(),
            signed_amount(transaction),
            transaction.description
        ),
    }
}

/// Horizontal bar of `value` relative to `max`.
pub fn bar(value: f64, max: f64) -> String {
    if max <= 0. || value <= 0. {
        return String::new();
    }
    let width = ((value / max) * BAR_WIDTH as f64).round().max(1.) as usize;
    "#".repeat(width.min(BAR_WIDTH))
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use crate::state::entities::{ExpenseCategory, Priority, Task, Transaction, TransactionType};

    use super::{bar, format_amount, short_id, signed_amount, task_line};

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(12.), "₹12.00");
        assert_eq!(format_amount(0.555), "₹0.56");
    }

    #[test]
    fn test_short_id() {
        assert_eq!(short_id("0123456789abcdef"), "01234567");
        assert_eq!(short_id("abc"), "abc");
    }

    #[test]
    fn test_bar() {
        assert_eq!(bar(10., 10.), "#".repeat(30));
        assert_eq!(bar(5., 10.).len(), 15);
        assert_eq!(bar(0.01, 10.), "#");
        assert_eq!(bar(0., 10.), "");
        assert_eq!(bar(3., 0.), "");
    }

    #[test]
    fn test_task_line_marks_fired_reminders() {
        let mut task = Task {
            id: "0123456789".into(),
            title: "Stretch".into(),
            priority: Priority::Low,
            completed: false,
            due_date: None,
            reminder_time: Some(Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap()),
            notified: false,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap(),
        };
        assert!(task_line(&task).starts_with("01234567\t[ ]\tLow"));
        assert!(!task_line(&task).ends_with(", fired"));
        task.notified = true;
        assert!(task_line(&task).ends_with(", fired"));
    }

    #[test]
    fn test_signed_amount() {
        let date = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        let transaction = Transaction {
            id: "x".into(),
            description: "Salary".into(),
            amount: 100.,
            category: ExpenseCategory::Income,
            kind: TransactionType::Income,
            date,
            created_at: date,
        };
        assert_eq!(signed_amount(&transaction), "+₹100.00");
    }
}
