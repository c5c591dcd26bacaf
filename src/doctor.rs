use taxflow_core::config::AppConfig;
use taxflow_rules::build_graph;

struct CheckResult {
    label: String,
    ok: bool,
    detail: String,
}

pub fn run_doctor(config: &AppConfig) {
    let checks = vec![
        check_graph(config),
        check_budget(config),
        check_rates(config),
        check_tolerance(config),
        check_defaults(config),
        check_remediation(config),
    ];

    let mut ok_count = 0;
    let mut fail_count = 0;

    for check in &checks {
        let icon = if check.ok { "[OK]" } else { "[!!]" };
        println!("  {} {}: {}", icon, check.label, check.detail);
        if check.ok {
            ok_count += 1;
        } else {
            fail_count += 1;
        }
    }

    println!();
    println!("  {} passed, {} issues found", ok_count, fail_count);
}

fn check_graph(config: &AppConfig) -> CheckResult {
    match build_graph(&config.remediation) {
        Ok(graph) => CheckResult {
            label: "Graph".into(),
            ok: true,
            detail: format!("{} steps, entry '{}'", graph.step_count(), graph.entry()),
        },
        Err(e) => CheckResult {
            label: "Graph".into(),
            ok: false,
            detail: e.to_string(),
        },
    }
}

fn check_budget(config: &AppConfig) -> CheckResult {
    let step_count = build_graph(&config.remediation).map_or(0, |g| g.step_count());
    let max_steps = config.engine.max_steps_for(step_count);

    // A clean run visits each step at most once.
    if max_steps < step_count {
        CheckResult {
            label: "Step budget".into(),
            ok: false,
            detail: format!("{} is below the {} registered steps", max_steps, step_count),
        }
    } else {
        CheckResult {
            label: "Step budget".into(),
            ok: true,
            detail: format!("{} invocations per run", max_steps),
        }
    }
}

fn check_rates(config: &AppConfig) -> CheckResult {
    let table = &config.validation.rate_table;
    if table.is_empty() {
        CheckResult {
            label: "Rate table".into(),
            ok: true,
            detail: "Not configured (built-in DE 19%)".into(),
        }
    } else {
        let codes: Vec<&str> = table.keys().map(String::as_str).collect();
        CheckResult {
            label: "Rate table".into(),
            ok: true,
            detail: format!("{} rates ({})", table.len(), codes.join(", ")),
        }
    }
}

fn check_tolerance(config: &AppConfig) -> CheckResult {
    let tolerance = config.validation.tolerance;
    if tolerance >= 1.0 {
        CheckResult {
            label: "Tolerance".into(),
            ok: false,
            detail: format!("{} accepts tax differences of a whole unit or more", tolerance),
        }
    } else {
        CheckResult {
            label: "Tolerance".into(),
            ok: true,
            detail: format!("{}", tolerance),
        }
    }
}

fn check_defaults(config: &AppConfig) -> CheckResult {
    let empty: Vec<&str> = config
        .validation
        .defaults
        .iter()
        .filter(|(_, v)| !taxflow_core::outcome::is_truthy(v))
        .map(|(k, _)| k.as_str())
        .collect();

    if !empty.is_empty() {
        CheckResult {
            label: "Defaults".into(),
            ok: false,
            detail: format!("Empty values are never applied: {}", empty.join(", ")),
        }
    } else if config.validation.defaults.is_empty() {
        CheckResult {
            label: "Defaults".into(),
            ok: true,
            detail: "Built-in only".into(),
        }
    } else {
        CheckResult {
            label: "Defaults".into(),
            ok: true,
            detail: format!("{} configured", config.validation.defaults.len()),
        }
    }
}

fn check_remediation(config: &AppConfig) -> CheckResult {
    match config.remediation.escalate_after {
        Some(0) => CheckResult {
            label: "Remediation".into(),
            ok: true,
            detail: "Escalates on first failure".into(),
        },
        Some(n) => CheckResult {
            label: "Remediation".into(),
            ok: true,
            detail: format!("Escalates after {} attempts per gate", n),
        },
        None => CheckResult {
            label: "Remediation".into(),
            ok: true,
            detail: "Always resumes; unresolved failures end at the step budget".into(),
        },
    }
}
