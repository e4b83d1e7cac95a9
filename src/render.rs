use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use handlebars::Handlebars;
use serde::Serialize;

use crate::{
    error::Result,
    messages::Message,
    types::{AssignmentInfo, ClassInfo, Listing, SubmissionInfo},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    Html,
}

#[derive(Serialize)]
struct ClassRow {
    name: String,
    path: String,
    project: String,
    instructor: String,
    role: String,
    assignments: usize,
    submissions: usize,
    created: String,
    download: String,
}

#[derive(Serialize)]
struct AssignmentRow {
    name: String,
    path: String,
    class: String,
    project: String,
    open: bool,
    submissions: usize,
    created: String,
    due: Option<String>,
    download: String,
}

#[derive(Serialize)]
struct SubmissionRow {
    user: String,
    path: String,
    submitter: String,
    size: u64,
    size_display: String,
    submitted: String,
    late: bool,
}

#[derive(Serialize)]
struct ClassesContext<'a> {
    title: &'a str,
    messages: &'a [Message],
    classes: Vec<ClassRow>,
}

#[derive(Serialize)]
struct ClassContext<'a> {
    messages: &'a [Message],
    class: ClassRow,
    assignments: Vec<AssignmentRow>,
}

#[derive(Serialize)]
struct AssignmentContext<'a> {
    messages: &'a [Message],
    assignment: AssignmentRow,
    submissions: Vec<SubmissionRow>,
}

fn fmt_time(t: &DateTime<Utc>) -> String {
    t.format("%Y-%m-%d %H:%M").to_string()
}

pub fn fmt_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

impl From<&ClassInfo> for ClassRow {
    fn from(c: &ClassInfo) -> Self {
        ClassRow {
            name: c.name.clone(),
            path: c.path.display().to_string(),
            project: c.project.clone(),
            instructor: c.instructor.clone(),
            role: c.role.to_string(),
            assignments: c.assignments.len(),
            submissions: c.submissions.len(),
            created: fmt_time(&c.created),
            download: format!("{}/{}", c.project, c.name),
        }
    }
}

impl From<&AssignmentInfo> for AssignmentRow {
    fn from(a: &AssignmentInfo) -> Self {
        AssignmentRow {
            name: a.name.clone(),
            path: a.path.display().to_string(),
            class: a.class.clone(),
            project: a.project.clone(),
            open: a.open,
            submissions: a.submissions.len(),
            created: fmt_time(&a.created),
            due: a.due.as_ref().map(fmt_time),
            download: format!("{}/{}/{}", a.project, a.class, a.name),
        }
    }
}

impl From<&SubmissionInfo> for SubmissionRow {
    fn from(s: &SubmissionInfo) -> Self {
        SubmissionRow {
            user: s.user.clone(),
            path: s.path.display().to_string(),
            submitter: s.submitter.clone(),
            size: s.size,
            size_display: fmt_size(s.size),
            submitted: fmt_time(&s.submitted),
            late: s.late,
        }
    }
}

fn handlebars() -> Result<Handlebars<'static>> {
    let mut handlebars = Handlebars::new();
    handlebars.register_partial("layout_head", include_str!("../template/layout_head.hbs"))?;
    handlebars.register_partial("messages", include_str!("../template/messages.hbs"))?;
    handlebars.register_template_string("classes", include_str!("../template/classes.hbs"))?;
    handlebars.register_template_string("class", include_str!("../template/class.hbs"))?;
    handlebars
        .register_template_string("assignment", include_str!("../template/assignment.hbs"))?;
    Ok(handlebars)
}

fn text_messages(out: &mut String, messages: &[Message]) {
    for m in messages {
        let _ = writeln!(out, "[{}] {}", m.severity, m.text);
    }
}

pub fn render_classes(
    format: OutputFormat,
    title: &str,
    listing: &Listing<ClassInfo>,
) -> Result<String> {
    let context = ClassesContext {
        title,
        messages: &listing.messages,
        classes: listing.rows.iter().map(ClassRow::from).collect(),
    };
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&context)?),
        OutputFormat::Html => Ok(handlebars()?.render("classes", &context)?),
        OutputFormat::Text => {
            let mut out = String::new();
            text_messages(&mut out, context.messages);
            let _ = writeln!(
                out,
                "{:<12} {:<20} {:<24} {:<10} {:>5} {:>5}  {}",
                "PROJECT", "CLASS", "INSTRUCTOR", "ROLE", "HW", "SUBS", "CREATED"
            );
            for c in context.classes.iter() {
                let _ = writeln!(
                    out,
                    "{:<12} {:<20} {:<24} {:<10} {:>5} {:>5}  {}",
                    c.project, c.name, c.instructor, c.role, c.assignments, c.submissions, c.created
                );
            }
            Ok(out)
        }
    }
}

pub fn render_class(
    format: OutputFormat,
    class: &ClassInfo,
    listing: &Listing<AssignmentInfo>,
) -> Result<String> {
    let context = ClassContext {
        messages: &listing.messages,
        class: ClassRow::from(class),
        assignments: listing.rows.iter().map(AssignmentRow::from).collect(),
    };
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&context)?),
        OutputFormat::Html => Ok(handlebars()?.render("class", &context)?),
        OutputFormat::Text => {
            let mut out = String::new();
            text_messages(&mut out, context.messages);
            let _ = writeln!(
                out,
                "{}/{} (instructor: {}, you: {})",
                context.class.project,
                context.class.name,
                context.class.instructor,
                context.class.role
            );
            let _ = writeln!(
                out,
                "{:<20} {:<7} {:>5}  {:<16}  {}",
                "ASSIGNMENT", "STATE", "SUBS", "CREATED", "DUE"
            );
            for a in context.assignments.iter() {
                let _ = writeln!(
                    out,
                    "{:<20} {:<7} {:>5}  {:<16}  {}",
                    a.name,
                    if a.open { "open" } else { "locked" },
                    a.submissions,
                    a.created,
                    a.due.as_deref().unwrap_or("-")
                );
            }
            Ok(out)
        }
    }
}

pub fn render_assignment(
    format: OutputFormat,
    assignment: &AssignmentInfo,
    listing: &Listing<SubmissionInfo>,
) -> Result<String> {
    let context = AssignmentContext {
        messages: &listing.messages,
        assignment: AssignmentRow::from(assignment),
        submissions: listing.rows.iter().map(SubmissionRow::from).collect(),
    };
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&context)?),
        OutputFormat::Html => Ok(handlebars()?.render("assignment", &context)?),
        OutputFormat::Text => {
            let mut out = String::new();
            text_messages(&mut out, context.messages);
            let a = &context.assignment;
            let _ = writeln!(
                out,
                "{}/{}/{} ({}, due {})",
                a.project,
                a.class,
                a.name,
                if a.open { "open" } else { "locked" },
                a.due.as_deref().unwrap_or("-")
            );
            let _ = writeln!(
                out,
                "{:<12} {:<24} {:>10}  {:<16}  {}",
                "USER", "NAME", "SIZE", "SUBMITTED", ""
            );
            for s in context.submissions.iter() {
                let _ = writeln!(
                    out,
                    "{:<12} {:<24} {:>10}  {:<16}  {}",
                    s.user,
                    s.submitter,
                    s.size_display,
                    s.submitted,
                    if s.late { "LATE" } else { "" }
                );
            }
            Ok(out)
        }
    }
}
