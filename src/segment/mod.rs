//! Job-posting segmentation: the fixed-shape record, its construction from parsed
//! model output, fallback records and prompt construction.

pub mod capitalize;
pub mod extract;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use capitalize::capitalize_company_name;
pub use extract::{ExtractStage, StructuredExtractor};

/// Message attached when extraction fell back to the generic record.
pub const PLACEHOLDER_MESSAGE: &str =
    "Could not parse model output; returning a generic placeholder record";

/// Message attached when no upstream model is configured.
pub const MOCK_MESSAGE: &str = "Using mock data - upstream model not configured";

/// The eight fields extracted from a job posting. Every field is independently optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentRecord {
    pub job_title: Option<String>,
    pub company_name: Option<String>,
    pub location: Option<String>,
    pub salary_range: Option<String>,
    pub work_schedule: Option<String>,
    pub contact_info: Option<String>,
    pub description: Option<String>,
    pub qualifications: Option<String>,
}

impl SegmentRecord {
    /// Build a record from a parsed JSON object. Unknown keys are ignored; `null`
    /// leaves a field absent; scalars are stringified and string lists are joined
    /// with ", " (models often return qualifications as an array).
    pub fn from_object(object: &Map<String, Value>) -> Self {
        let field = |key: &str| object.get(key).and_then(field_text);
        Self {
            job_title: field("jobTitle"),
            company_name: field("companyName"),
            location: field("location"),
            salary_range: field("salaryRange"),
            work_schedule: field("workSchedule"),
            contact_info: field("contactInfo"),
            description: field("description"),
            qualifications: field("qualifications"),
        }
    }

    /// Generic record substituted when every extraction stage failed.
    pub fn placeholder(original_description: &str) -> Self {
        Self {
            job_title: Some("Job Position".into()),
            company_name: Some("Company".into()),
            location: Some("Location".into()),
            salary_range: Some("Salary TBD".into()),
            work_schedule: Some(String::new()),
            contact_info: Some(String::new()),
            description: Some(format!(
                "We are seeking a qualified candidate for this position. {}",
                original_description.trim()
            )),
            qualifications: Some(
                "Experience in relevant field, Strong communication skills, Team player".into(),
            ),
        }
    }

    /// Fixed record returned when no upstream model is configured.
    pub fn sample() -> Self {
        Self {
            job_title: Some("Sample Job".into()),
            company_name: Some("Sample Company".into()),
            location: Some("Sample Location".into()),
            salary_range: Some("Sample Salary".into()),
            work_schedule: Some(String::new()),
            contact_info: Some(String::new()),
            description: Some(
                "This is a sample job description generated for testing purposes.".into(),
            ),
            qualifications: Some("Sample qualifications".into()),
        }
    }

    /// Title-case the company name in place, if present.
    pub fn capitalize_company(&mut self) {
        if let Some(name) = self.company_name.as_mut() {
            if !name.is_empty() {
                *name = capitalize_company_name(name);
            }
        }
    }
}

fn field_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(field_text)
                .collect::<Vec<_>>()
                .join(", "),
        ),
        Value::Object(_) => Some(value.to_string()),
    }
}

/// Caller-facing segmentation result. `placeholder` is set whenever `data` did
/// not come from the model's own output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segmentation {
    pub data: SegmentRecord,
    pub placeholder: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Segmentation {
    pub fn extracted(data: SegmentRecord) -> Self {
        Self {
            data,
            placeholder: false,
            message: None,
        }
    }

    pub fn placeholder(data: SegmentRecord, message: &str) -> Self {
        Self {
            data,
            placeholder: true,
            message: Some(message.to_string()),
        }
    }
}

/// Build the segmentation prompt asking for a bare JSON object with the eight fields.
pub fn build_prompt(description: &str) -> String {
    format!(
        r#"You are a job description analyzer. Extract information from this job description and return ONLY a JSON object. Do not include any other text, explanations, or formatting.

Job Description: "{description}"

Extract these fields into a JSON object:
- jobTitle: The job position/role
- companyName: The business/company name
- location: The work location (city, state format)
- salaryRange: The salary/wage with currency and period
- workSchedule: Work days and hours (if mentioned)
- contactInfo: Contact person (if mentioned)
- description: A professional job description (create one if not provided)
- qualifications: Required skills and experience (create comprehensive list if not provided)

Rules:
- For location, use "City, State" format, ignore street addresses
- For salary, include currency symbol and period (e.g., "$35/hr", "$50,000/year")
- For company names, preserve "The" if present
- Extract only the job title, not surrounding words like "opportunity" or "position"
- If description is missing or minimal, write a professional job description based on the job title
- If qualifications are missing, list relevant skills and experience for the role

IMPORTANT: Return ONLY the JSON object. Do not include any text before or after the JSON. Do not use markdown formatting.

Example output format:
{{"jobTitle": "Sous Chef", "companyName": "The Grandview Restaurant", "location": "San Jose, CA", "salaryRange": "$35/hr", "workSchedule": "", "contactInfo": "", "description": "We are seeking an experienced Sous Chef to assist the Head Chef in managing kitchen operations.", "qualifications": "Culinary degree or equivalent experience, 3+ years in professional kitchen, Food safety certification"}}

Return the JSON object:"#
    )
}
