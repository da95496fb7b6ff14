//! Human and JSON rendering of run results

use hostprov_core::{ActionStatus, Playbook, RunReport, TagFilter};

/// One line per outcome followed by the recap
pub fn report_text(report: &RunReport) -> String {
    let mut out = String::new();
    for outcome in &report.outcomes {
        let status = match (outcome.status, outcome.ignored) {
            (ActionStatus::Failed, true) => "ignored".to_string(),
            (status, _) => status.to_string(),
        };
        out.push_str(&format!("{status:<8} {}", outcome.name));
        if let Some(message) = &outcome.message {
            out.push_str(&format!(": {message}"));
        }
        out.push('\n');
    }
    out.push_str(&format!("\nRECAP {}\n", report.recap()));
    out
}

/// Report as pretty JSON, recap included
///
/// # Errors
/// Returns error if serialization fails
pub fn report_json(report: &RunReport) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&serde_json::json!({
        "report": report,
        "recap": report.recap(),
    }))
}

/// Numbered list of the actions `filter` selects, with their tags
pub fn task_list(playbook: &Playbook, filter: &TagFilter) -> String {
    playbook
        .actions
        .iter()
        .enumerate()
        .filter(|(_, action)| filter.matches(action))
        .map(|(idx, action)| {
            let tags: Vec<&str> = action.tags.iter().map(String::as_str).collect();
            format!("{:>2}. {} [{}]\n", idx + 1, action.name, tags.join(", "))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use hostprov_core::{ActionOutcome, Vars};

    use super::*;

    fn outcome(name: &str, status: ActionStatus, ignored: bool) -> ActionOutcome {
        ActionOutcome {
            name: name.to_string(),
            status,
            message: ignored.then(|| "non-zero exit status 1".to_string()),
            ignored,
            duration: Duration::ZERO,
        }
    }

    #[test]
    fn test_report_text() {
        let mut report = RunReport::new();
        report.outcomes.push(outcome("Set hostname", ActionStatus::Changed, false));
        report
            .outcomes
            .push(outcome("Check for a working nvm", ActionStatus::Failed, true));

        let text = report_text(&report);
        assert!(text.starts_with("changed  Set hostname\n"));
        assert!(text.contains("ignored  Check for a working nvm: non-zero exit status 1\n"));
        assert!(text.ends_with("RECAP ok=0 changed=1 failed=1 skipped=0 ignored=1\n"));
    }

    #[test]
    fn test_report_text_empty_run() {
        let text = report_text(&RunReport::new());
        assert_eq!(text, "\nRECAP ok=0 changed=0 failed=0 skipped=0 ignored=0\n");

        let playbook = Playbook::xo_server(&Vars::new("xo.lan")).unwrap();
        let none = TagFilter::new(["no-such-tag"], Vec::<String>::new());
        assert_eq!(task_list(&playbook, &none), "");
    }

    #[test]
    fn test_report_json() {
        let mut report = RunReport::new();
        report.outcomes.push(outcome("Set hostname", ActionStatus::Ok, false));

        let json: serde_json::Value = serde_json::from_str(&report_json(&report).unwrap()).unwrap();
        assert_eq!(json["recap"]["ok"], 1);
        assert_eq!(json["report"]["outcomes"][0]["status"], "ok");
    }

    #[test]
    fn test_task_list_keeps_positions() {
        let playbook = Playbook::xo_server(&Vars::new("xo.lan")).unwrap();
        let list = task_list(&playbook, &TagFilter::new(["service"], Vec::<String>::new()));

        let lines: Vec<&str> = list.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "23. Look up node PATH [service]");
        assert_eq!(lines[2], "25. Start and enable xo-server [service]");
    }
}
