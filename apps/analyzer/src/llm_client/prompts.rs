// Fixed instruction templates. Not user-editable; the request always ends with one of these.

/// Recruiter-style review: where the candidate fits, where they fall short.
pub const HR_PROMPT: &str = "
You're acting as an experienced HR specialist with strong technical awareness.
Evaluate this resume against the job description: highlight where the candidate fits well,
where they fall short, and any key observations.
";

/// Applicant Tracking System simulation: match percentage and missing keywords.
pub const ATS_PROMPT: &str = "
You're simulating an ATS (Applicant Tracking System) and evaluating the resume against the job description.
Provide:
1. A percentage match
2. Any important keywords missing
3. Final summary thoughts
";
