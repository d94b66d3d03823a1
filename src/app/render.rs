use crate::catalog::ModelCatalog;
use crate::harness::{
    HarnessState, ModelOutcome, Rank, ResponseMetrics, ResponseRanking, TestCase, ViewMode,
    rank_responses,
};
use crate::ui::style;

fn cost_text(cost: f64) -> String {
    format!("${cost:.4}")
}

fn latency_text(latency: f64) -> String {
    format!("{latency:.2}s")
}

fn per_million(cost_per_token: f64) -> String {
    format!("${:.2}", cost_per_token * 1_000_000.0)
}

pub fn render_catalog(catalog: &ModelCatalog, include_all: bool, selected: &[String]) -> String {
    let mut lines = vec![format!(
        "{}  {}",
        style::header("Models"),
        style::dim("(input / output per 1M tokens)")
    )];
    for entry in catalog
        .entries()
        .iter()
        .filter(|entry| include_all || entry.is_chat())
    {
        let marker = if selected.iter().any(|model| model == &entry.id) {
            style::success("✓")
        } else {
            " ".to_string()
        };
        let mut line = format!(
            "{marker} {:<36} {:>8} / {:<8}",
            entry.id,
            per_million(entry.input_cost_per_token),
            per_million(entry.output_cost_per_token)
        );
        if include_all {
            let per_dollar = entry.tokens_per_dollar().map_or_else(
                || "free".to_string(),
                |ratio| format!("{:.0} in / {:.0} out per $", ratio.input_tokens, ratio.output_tokens),
            );
            line.push_str(&format!(" {} {}", style::dim(entry.mode), style::dim(per_dollar)));
        }
        lines.push(line);
    }
    lines.join("\n")
}

pub fn render_selection(state: &HarnessState) -> String {
    if state.selected_models.is_empty() {
        return style::dim("No models selected. Add one with `langmetres models add <id>`.");
    }
    let mut lines = vec![style::header("Selected models")];
    for model in state.selected_models.iter() {
        let config = state.config_for(model);
        lines.push(format!(
            "  {}  temperature {}  top_p {}",
            style::accent(model),
            style::value(config.temperature),
            style::value(config.top_p)
        ));
    }
    lines.join("\n")
}

fn prompt_preview(prompt: &str) -> String {
    let first_line = prompt.lines().next().unwrap_or_default();
    if first_line.is_empty() {
        return style::dim("(empty prompt)");
    }
    let mut preview: String = first_line.chars().take(60).collect();
    if first_line.chars().count() > 60 || prompt.lines().nth(1).is_some() {
        preview.push('…');
    }
    preview
}

pub fn render_case_list(state: &HarnessState) -> String {
    let mut lines = vec![style::header("Test cases")];
    for (index, case) in state.test_cases.iter().enumerate() {
        let graded = case.responses.values().filter(|r| r.passed.is_some()).count();
        let passed = case.responses.values().filter(|r| r.is_passed()).count();
        let status = if case.loading {
            style::yellow("running")
        } else {
            style::dim(format!(
                "{} responses, {passed}/{graded} passed",
                case.responses.len()
            ))
        };
        lines.push(format!(
            "{:>3}. {}  {}  {}",
            index + 1,
            style::accent(&case.name),
            prompt_preview(&case.prompt),
            status
        ));
    }
    lines.join("\n")
}

fn render_content(response: &ResponseMetrics, mode: ViewMode) -> Vec<String> {
    if response.is_failure() {
        return vec![format!("    {}", style::failure(&response.response_content))];
    }
    match mode {
        ViewMode::Raw => response
            .response_content
            .lines()
            .map(|line| format!("    {line}"))
            .collect(),
        ViewMode::Markdown => response
            .response_content
            .lines()
            .map(|line| {
                if line.trim_start().starts_with('#') {
                    format!("    {}", style::header(line.trim_start_matches('#').trim()))
                } else {
                    format!("    {line}")
                }
            })
            .collect(),
    }
}

fn verdict(response: &ResponseMetrics) -> String {
    match response.passed {
        Some(true) => style::success("PASS"),
        Some(false) => style::failure("FAIL"),
        None => style::dim("ungraded"),
    }
}

fn metrics_line(response: &ResponseMetrics, ranking: Option<&ResponseRanking>) -> String {
    let rank = |pick: fn(&ResponseRanking) -> Rank| ranking.map_or(Rank::Neutral, pick);
    let usage = &response.usage;
    format!(
        "    tokens {}/{}/{}  cost {}  latency {}",
        usage.prompt_tokens,
        usage.completion_tokens,
        style::ranked(usage.total_tokens, rank(|r| r.total_tokens)),
        style::ranked(cost_text(usage.cost), rank(|r| r.cost)),
        style::ranked(latency_text(usage.latency), rank(|r| r.latency)),
    )
}

/// One test case with every response, metrics coloured against the siblings.
pub fn render_test_case(state: &HarnessState, index: usize) -> Option<String> {
    let case: &TestCase = state.test_case(index)?;
    let rankings = rank_responses(case);

    let mut lines = vec![format!(
        "{} {}{}",
        style::accent(format!("#{}", index + 1)),
        style::header(&case.name),
        if case.loading {
            format!("  {}", style::yellow("(running)"))
        } else {
            String::new()
        }
    )];
    lines.push(style::dim("Prompt:"));
    if case.prompt.is_empty() {
        lines.push(format!("  {}", style::dim("(empty)")));
    } else {
        lines.extend(case.prompt.lines().map(|line| format!("  {line}")));
    }

    if case.responses.is_empty() {
        lines.push(style::dim("No responses yet."));
    }
    for (model, response) in &case.responses {
        let mode = case.view_mode_for(model);
        lines.push(String::new());
        lines.push(format!(
            "  {}  {}  {}",
            style::accent(model),
            verdict(response),
            style::dim(mode)
        ));
        lines.extend(render_content(response, mode));
        if !response.is_failure() {
            let ranking = rankings.iter().find(|ranking| &ranking.model == model);
            lines.push(metrics_line(response, ranking));
        }
    }
    Some(lines.join("\n"))
}

/// Single line printed as soon as a model's call settles.
pub fn render_outcome(outcome: &ModelOutcome) -> String {
    match &outcome.result {
        Ok(response) => format!(
            "  {} {}  {} tokens  {}  {}",
            style::success("✓"),
            style::accent(&outcome.model),
            response.usage.total_tokens,
            cost_text(response.usage.cost),
            latency_text(response.usage.latency)
        ),
        Err(error) => format!(
            "  {} {}  {}",
            style::failure("✗"),
            style::accent(&outcome.model),
            error
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CompletionError;
    use crate::harness::UsageMetrics;
    use std::collections::BTreeMap;

    fn state() -> HarnessState {
        let mut case = TestCase::new("Greeting");
        case.prompt = "Say hi".into();
        let mut cheap = ResponseMetrics::completed(
            "fast",
            "# Hi\nthere",
            UsageMetrics {
                prompt_tokens: 2,
                completion_tokens: 3,
                total_tokens: 5,
                cost: 0.0001,
                latency: 0.4,
            },
        );
        cheap.passed = Some(true);
        case.responses.insert("fast".into(), cheap);
        case.responses
            .insert("broken".into(), ResponseMetrics::failed("broken", "HTTP error! status: 500"));
        case.view_mode.insert("fast".into(), ViewMode::Raw);
        HarnessState::new(vec!["fast".into(), "broken".into()], BTreeMap::new(), vec![case])
    }

    #[test]
    fn test_case_view_shows_content_metrics_and_failures() {
        let text = render_test_case(&state(), 0).unwrap();
        assert!(text.contains("Greeting"));
        assert!(text.contains("# Hi"));
        assert!(text.contains("$0.0001"));
        assert!(text.contains("0.40s"));
        assert!(text.contains("Error: HTTP error! status: 500"));
        assert!(render_test_case(&state(), 3).is_none());
    }

    #[test]
    fn case_list_counts_grades() {
        let text = render_case_list(&state());
        assert!(text.contains("1."));
        assert!(text.contains("2 responses, 1/1 passed"));
    }

    #[test]
    fn catalog_hides_non_chat_unless_asked() {
        let catalog = ModelCatalog::builtin();
        let chat_only = render_catalog(&catalog, false, &["gpt-4o".into()]);
        assert!(chat_only.contains("gpt-4o"));
        assert!(!chat_only.contains("text-embedding-3-small"));
        assert!(render_catalog(&catalog, true, &[]).contains("text-embedding-3-small"));
    }

    #[test]
    fn outcome_line_names_the_error() {
        let outcome = ModelOutcome {
            model: "broken".into(),
            result: Err(CompletionError::Status {
                status: 503,
                body: "overloaded".into(),
            }),
        };
        assert!(render_outcome(&outcome).contains("HTTP error! status: 503: overloaded"));
    }
}
