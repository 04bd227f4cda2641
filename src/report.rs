//! Skill demand report over the latest view of the warehouse.

use std::collections::HashMap;

use crate::model::Posting;

/// Rows shown in the latest extractions table.
const LATEST_ROWS: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct SkillReport {
    /// Postings in the view that already carry extracted skills.
    pub analyzed: usize,
    /// Postings still waiting for the external transformation.
    pub pending: usize,
    pub top_role: Option<String>,
    pub skills: Vec<(String, usize)>,
    /// (title, skills) of the freshest analyzed postings.
    pub latest: Vec<(String, String)>,
}

pub fn build(view: &[Posting], top_n: usize) -> SkillReport {
    let analyzed: Vec<&Posting> = view.iter().filter(|p| p.extracted_skills.is_some()).collect();
    SkillReport {
        analyzed: analyzed.len(),
        pending: view.len() - analyzed.len(),
        top_role: most_common(analyzed.iter().map(|p| p.title.as_str())),
        skills: skill_frequency(view, top_n),
        latest: analyzed
            .iter()
            .take(LATEST_ROWS)
            .filter_map(|p| Some((p.title.clone(), p.extracted_skills.clone()?)))
            .collect(),
    }
}

/// Uppercased skill tokens counted across postings with extracted skills,
/// highest count first. Equal counts keep first-seen order.
pub fn skill_frequency(view: &[Posting], top_n: usize) -> Vec<(String, usize)> {
    let tokens = view
        .iter()
        .filter_map(|p| p.extracted_skills.as_deref())
        .flat_map(|s| s.split(','))
        .map(|t| t.trim().to_uppercase())
        .filter(|t| !t.is_empty());

    let mut ranked = count_in_order(tokens);
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked.truncate(top_n);
    ranked
}

fn most_common<'a>(values: impl Iterator<Item = &'a str>) -> Option<String> {
    count_in_order(values.map(str::to_string))
        .into_iter()
        .fold(None, |best: Option<(String, usize)>, (v, n)| match best {
            Some((_, m)) if m >= n => best,
            _ => Some((v, n)),
        })
        .map(|(v, _)| v)
}

/// Counts per distinct value, in order of first appearance.
fn count_in_order(values: impl Iterator<Item = String>) -> Vec<(String, usize)> {
    let mut slots: HashMap<String, usize> = HashMap::new();
    let mut counts: Vec<(String, usize)> = Vec::new();
    for v in values {
        match slots.get(&v) {
            Some(&i) => counts[i].1 += 1,
            None => {
                slots.insert(v.clone(), counts.len());
                counts.push((v, 1));
            }
        }
    }
    counts
}

/// Horizontal text bar chart, longest bar for the top skill.
pub fn render(report: &SkillReport) -> String {
    let mut out = String::new();
    out.push_str(&format!("Unique jobs analyzed: {}\n", report.analyzed));
    out.push_str(&format!(
        "Top role:             {}\n",
        report.top_role.as_deref().unwrap_or("N/A")
    ));
    out.push_str(&format!("Awaiting extraction:  {}\n", report.pending));

    if report.skills.is_empty() {
        out.push_str("\nNo skill data found. Run the skill extraction job first.\n");
        return out;
    }

    out.push_str(&format!("\nTop {} most demanded skills\n", report.skills.len()));
    let width = report.skills.iter().map(|(s, _)| s.chars().count()).max().unwrap_or(0);
    let max = report.skills.first().map(|(_, n)| *n).unwrap_or(1).max(1);
    for (i, (skill, n)) in report.skills.iter().enumerate() {
        let bar = "#".repeat((n * 40).div_ceil(max));
        out.push_str(&format!(
            "{:>3}. {:<width$} {:>4} {}\n",
            i + 1,
            skill,
            n,
            bar,
            width = width
        ));
    }

    out.push_str("\nLatest unique job extractions\n");
    for (title, skills) in &report.latest {
        out.push_str(&format!("  {} | {}\n", title, skills));
    }
    out
}
