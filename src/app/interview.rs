use crate::core::taste::{InterviewAnswers, RenovationTolerance};
use anyhow::Result;
use console::style;
use dialoguer::{Input, Select};

// (prompt, bucket) pairs; answers are comma-separated statements.
const QUESTIONS: [(&str, Bucket); 7] = [
    ("What architectural styles do you love?", Bucket::Principles),
    ("What architectural styles do you hate?", Bucket::AntiPrinciples),
    ("What makes a house feel cheap to you?", Bucket::AntiPrinciples),
    ("What's your take on open floor plans?", Bucket::Principles),
    ("What are absolute deal-breakers? (e.g. \"no flip\")", Bucket::HardConstraints),
    ("Any specific must-haves?", Bucket::HardConstraints),
    ("Nice-to-haves that should nudge the score?", Bucket::SoftConstraints),
];

#[derive(Clone, Copy)]
enum Bucket {
    Principles,
    AntiPrinciples,
    HardConstraints,
    SoftConstraints,
}

/// Split a comma/semicolon separated answer into trimmed statements.
pub fn split_answer(answer: &str) -> Vec<String> {
    answer
        .split([',', ';'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Ask the bootstrap questions on the terminal.
pub fn run_interview() -> Result<InterviewAnswers> {
    println!(
        "{}",
        style("Taste interview. Separate several answers with commas; leave blank to skip.")
            .cyan()
            .bold()
    );

    let mut answers = InterviewAnswers::default();
    for (prompt, bucket) in QUESTIONS {
        let answer: String = Input::new()
            .with_prompt(format!("  {prompt}"))
            .allow_empty(true)
            .interact_text()?;
        let items = split_answer(&answer);
        match bucket {
            Bucket::Principles => answers.principles.extend(items),
            Bucket::AntiPrinciples => answers.anti_principles.extend(items),
            Bucket::HardConstraints => answers.hard_constraints.extend(items),
            Bucket::SoftConstraints => answers.soft_constraints.extend(items),
        }
    }

    let tolerances = [
        RenovationTolerance::None,
        RenovationTolerance::Light,
        RenovationTolerance::Medium,
        RenovationTolerance::Heavy,
    ];
    let labels: Vec<String> = tolerances.iter().map(ToString::to_string).collect();
    let picked = Select::new()
        .with_prompt("  How much renovation are you willing to take on?")
        .items(&labels)
        .default(2)
        .interact()?;
    answers.renovation_tolerance = tolerances.get(picked).copied();

    let budget: String = Input::new()
        .with_prompt("  Maximum renovation budget in dollars (blank for none)")
        .allow_empty(true)
        .interact_text()?;
    answers.renovation_budget_max = budget.trim().replace([',', '$'], "").parse().ok();

    Ok(answers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answers_split_on_commas_and_semicolons() {
        assert_eq!(
            split_answer(" craftsman, mid-century ; ,tudor "),
            vec!["craftsman", "mid-century", "tudor"]
        );
        assert!(split_answer("   ").is_empty());
    }
}
