//! Embedded sample extractions in the IDP payload shape: one job description
//! and five resumes. Served by the fixture adapter and used as the fallback
//! when the provider fails on a single document.

use serde_json::{json, Value};

pub fn job_description() -> Value {
    json!({
        "Job_Title": "Business Development Manager",
        "Employment_Type": "Full-time",
        "Travel": "Not Found",
        "Summary": "This position will ensure compliance with Environmental Health and Safety (EHS) policies, Good Documentation Practices (GDP), Good Laboratory Practice (GLP), Good Manufacturing Practices (GMP), Standard Operating Procedures (SOPs), EMEA and FDA Guidelines, and applicable State and Country Regulations where site appropriate.",
        "Experience": {
            "Required_Experience": [
                "sales or business development experience representing complex life science products and/or services to pharmaceutical, biotech and diagnostics companies"
            ]
        },
        "Qualifications": {
            "Qualifications_Required": [
                "At least 3 years sales or business development experience representing complex life science products and/or services to pharmaceutical, biotech and diagnostics companies"
            ],
            "Qualifications_Preferred": []
        },
        "Skills": {
            "Skills": ["Microsoft Excel", "Word", "Outlook"]
        },
        "Education": {
            "Education": "BA/BS in science or business related field, plus 4 years commercial life science experience (microbiology, biology, chemistry or biochemistry preferred)"
        },
        "Responsibilities": {
            "Responsibility_Duties": [
                "Responsible for achieving regional sales targets on a quarterly basis in accordance with the annual corporate sales plan",
                "Help with the preparation of proposals in collaboration with your colleagues in operations",
                "Negotiate complex business arrangements",
                "Maintain and enhance the Company's value proposition and professional reputation"
            ]
        },
        "Compliance": {
            "Compliance_Regulatory": [
                "CLIA", "CAP", "USP", "ISO 9001", "USDA regulations", "HTA license",
                "DEA and State Controlled Substance programs"
            ]
        }
    })
}

pub fn resumes() -> Vec<Value> {
    vec![
        resume(
            ("Sarah Martinez", "sarah.martinez@email.com", "617-234-5678", "Boston", "MA"),
            &[
                "Business Development", "Sales Strategy", "Life Sciences", "Pharmaceutical Sales",
                "Client Relations", "Market Analysis", "Proposal Writing", "Negotiation",
                "Account Management", "Strategic Planning",
            ],
            &["Microsoft Excel", "PowerPoint", "CRM Systems", "Salesforce"],
            "6",
            "not found",
            ("BioTech Solutions", "Business Development Manager", "2020 - present"),
            &[
                "Led business development for life science products and services",
                "Generated $5M+ in annual revenue through strategic partnerships",
                "Developed and maintained relationships with pharmaceutical and biotech clients",
                "Exceeded quarterly sales targets by 25%",
            ],
            ("Master of Science in Biology", "Harvard University", "2020"),
        ),
        resume(
            ("Michael Chen", "michael.chen@email.com", "212-345-6789", "New York", "NY"),
            &[
                "Sales Management", "Pharmaceutical Industry", "Key Account Management",
                "Business Development", "Life Sciences", "Client Relations", "Market Research",
                "Strategic Planning", "Team Leadership", "Revenue Growth",
            ],
            &["Microsoft Office", "CRM Software", "Sales Analytics", "Power BI"],
            "8",
            "Pharmaceutical Sales Certification",
            ("PharmaCorp International", "Senior Sales Manager", "2018 - present"),
            &[
                "Managed key accounts in pharmaceutical and biotech sectors",
                "Led sales team of 12 professionals across multiple regions",
                "Developed new business opportunities worth $15M+ annually",
                "Exceeded quarterly targets by 30% consistently",
            ],
            ("Bachelor of Science in Chemistry", "MIT", "2018"),
        ),
        resume(
            ("Emily Rodriguez", "emily.rodriguez@email.com", "215-456-7890", "Philadelphia", "PA"),
            &[
                "Strategic Partnerships", "Healthcare Management", "Market Strategy",
                "Business Development", "Life Sciences", "Client Relations",
                "Proposal Development", "Negotiation", "Project Management", "Financial Analysis",
            ],
            &["Microsoft Office", "Project Management Software", "CRM Systems", "Data Analytics Tools"],
            "5",
            "PMP Certification",
            ("MedPartners Global", "Business Development Specialist", "2021 - present"),
            &[
                "Developed strategic partnerships in healthcare and life sciences sectors",
                "Expanded market presence across multiple regions",
                "Generated $3M+ in new business opportunities",
                "Led cross-functional team initiatives and proposal development",
            ],
            ("Master of Business Administration", "Wharton School", "2021"),
        ),
        resume(
            ("David Thompson", "david.thompson@email.com", "312-567-8901", "Chicago", "IL"),
            &[
                "Business Development", "Healthcare Industry", "Strategic Planning",
                "Life Sciences", "Team Leadership", "Revenue Growth", "Client Relations",
                "Market Analysis", "Partnership Development", "Executive Management",
            ],
            &["Microsoft Office", "CRM Systems", "Financial Modeling", "Market Research Tools"],
            "12",
            "Executive MBA",
            ("LifeSciences Corporation", "Director of Business Development", "2017 - present"),
            &[
                "Led business development team of 20+ professionals",
                "Strategic initiatives across multiple healthcare verticals",
                "Generated $50M+ in annual revenue",
                "Established partnerships with major healthcare systems and pharmaceutical companies",
            ],
            ("Master of Science in Biotechnology", "Northwestern University", "2017"),
        ),
        resume(
            ("Lisa Wang", "lisa.wang@email.com", "206-678-9012", "Seattle", "WA"),
            &[
                "Business Development", "Life Sciences", "Technology Integration",
                "Healthcare Partnerships", "Digital Health", "Strategic Planning",
                "Client Relations", "Market Analysis", "Proposal Writing", "Project Management",
            ],
            &["Microsoft Office", "CRM Systems", "Data Analytics", "Project Management Software"],
            "7",
            "not found",
            ("Digital Health Solutions", "Business Development Manager", "2019 - present"),
            &[
                "Specialized in digital health partnerships and technology integration",
                "Led digital transformation initiatives in healthcare systems",
                "Generated $20M+ in digital health revenue",
                "Developed strategic partnerships with healthcare technology companies",
            ],
            ("Master of Science in Computer Science", "University of Washington", "2019"),
        ),
    ]
}

/// Picks one fixture resume deterministically from a content hash.
pub fn resume_for_hash(content_hash: &str) -> Value {
    let pool = resumes();
    let index = content_hash
        .bytes()
        .fold(0usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize))
        % pool.len();
    pool[index].clone()
}

#[allow(clippy::too_many_arguments)]
fn resume(
    (name, email, phone, city, state): (&str, &str, &str, &str, &str),
    skills_core: &[&str],
    tools: &[&str],
    total_years: &str,
    certifications: &str,
    (company, title, dates): (&str, &str, &str),
    duties: &[&str],
    (degree, institution, graduated): (&str, &str, &str),
) -> Value {
    json!({
        "Full_Name": name,
        "email": email,
        "phone": phone,
        "city": city,
        "state_or_region": state,
        "country": "United States",
        "skills_core": skills_core,
        "total_years_experience": total_years,
        "tools_platforms": tools,
        "certifications_licenses": certifications,
        "Work_Experience": [{
            "Company": company,
            "Job_Title": title,
            "Employment_Dates": dates,
            "Responsibilities": duties
        }],
        "Education": [{
            "Degree": degree,
            "Institution": institution,
            "Graduation_Year": graduated
        }]
    })
}
