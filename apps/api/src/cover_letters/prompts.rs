// Prompt text for cover letter generation.

use crate::models::job::JobRow;

/// Marker separating the job summary from the letter in the prompt and in model output.
pub const COVER_LETTER_MARKER: &str = "Cover Letter:";

pub const COVER_LETTER_SYSTEM: &str = "You are a freelancer writing a short, specific cover letter \
    for a job posting. Continue the letter that the user has started. \
    Write plain prose only: no headings, no bullet points, no markdown. \
    Keep it under six sentences and do not repeat the opening line.";

/// Skills named in the prompt.
const PROMPT_SKILLS: usize = 3;

/// Builds the job summary plus the letter opening that generation continues from.
pub fn cover_letter_prompt(job: &JobRow) -> String {
    let skills = job.skill_list();
    let skills = if skills.is_empty() {
        "relevant technologies".to_string()
    } else {
        skills
            .iter()
            .take(PROMPT_SKILLS)
            .cloned()
            .collect::<Vec<_>>()
            .join(", ")
    };

    format!(
        "Job: {title}\nType: {job_type}\nBudget: {budget}\nSkills: {skills}\n\n{marker}\n{opening}",
        title = job.job_title,
        job_type = job.job_type.as_deref().unwrap_or("Project"),
        budget = job.budget.as_deref().unwrap_or("Not specified"),
        marker = COVER_LETTER_MARKER,
        opening = letter_opening(&job.job_title),
    )
}

pub fn letter_opening(job_title: &str) -> String {
    format!("Dear Hiring Manager,\n\nI am excited to apply for the {job_title} position.")
}
