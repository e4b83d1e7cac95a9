use std::{
    fs::OpenOptions,
    io::{BufWriter, Write},
    path::Path,
};

use crate::{
    accounts::Accounts,
    config::DashboardConfig,
    error::{DashboardError, Result},
    messages::Message,
    scan::scan_assignment,
    types::SubmissionInfo,
};

pub fn write_submissions<W: Write>(out: W, submissions: &[SubmissionInfo]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(out);
    wtr.write_record(["User", "Name", "Submitted", "Size", "Late"])?;
    for s in submissions {
        wtr.write_record([
            s.user.clone(),
            s.submitter.clone(),
            s.submitted.to_rfc3339(),
            s.size.to_string(),
            if s.late { String::from("yes") } else { String::from("no") },
        ])?;
    }
    wtr.flush().map_err(csv::Error::from)?;
    Ok(())
}

/// Writes the submission table of one assignment to `out_file`, replacing it.
pub fn export_assignment(
    config: &DashboardConfig,
    accounts: &Accounts,
    project: &str,
    class: &str,
    assignment: &str,
    out_file: &Path,
) -> Result<Message> {
    let (_, listing) = scan_assignment(config, accounts, project, class, assignment)?;
    let f = OpenOptions::new()
        .write(true)
        .truncate(true)
        .create(true)
        .open(out_file)
        .map_err(|e| DashboardError::from_io("creating", out_file, e))?;
    write_submissions(BufWriter::new(f), &listing.rows)?;
    tracing::info!(out = %out_file.display(), rows = listing.rows.len(), "exported submissions");
    Ok(Message::success(format!(
        "Exported {} submission{} to {}",
        listing.rows.len(),
        if listing.rows.len() == 1 { "" } else { "s" },
        out_file.display()
    )))
}

#[cfg(test)]
mod tests {
    use std::{fs::File, path::PathBuf};

    use assert_fs::prelude::*;
    use chrono::{DateTime, TimeZone, Utc};

    use super::*;

    fn submission(user: &str, name: &str, late: bool) -> SubmissionInfo {
        SubmissionInfo {
            path: PathBuf::from(format!("/fs/project/PZS0001/mathclass/hw1/{}", user)),
            user: String::from(user),
            submitter: String::from(name),
            size: 30,
            submitted: Utc.with_ymd_and_hms(2023, 1, 9, 12, 0, 0).unwrap(),
            late,
        }
    }

    #[test]
    fn csv_has_one_row_per_submission() {
        let mut out = Vec::new();
        write_submissions(
            &mut out,
            &[
                submission("alice", "Alice Liddell", true),
                submission("bob", "Builder, Bob", false),
            ],
        )
        .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "User,Name,Submitted,Size,Late\n\
             alice,Alice Liddell,2023-01-09T12:00:00+00:00,30,yes\n\
             bob,\"Builder, Bob\",2023-01-09T12:00:00+00:00,30,no\n"
        );
    }

    fn no_names(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn export_writes_file() {
        let tmp = assert_fs::TempDir::new().unwrap();
        let config = DashboardConfig {
            projects_root: tmp.path().to_path_buf(),
            ..DashboardConfig::default()
        };
        let accounts = Accounts::new(|| Ok(Vec::new()), no_names);
        let class = tmp.child("PZS0001/mathclass");
        class.child(&config.class_marker).touch().unwrap();
        class
            .child("hw1/meta_date_a")
            .write_str("Created: 2023-01-01\nDue: 2023-01-10\n")
            .unwrap();
        let alice = class.child("hw1/alice");
        alice.child("main.py").write_str("print(1)").unwrap();
        let submitted: DateTime<Utc> = Utc.with_ymd_and_hms(2023, 1, 11, 0, 0, 0).unwrap();
        File::open(alice.path())
            .unwrap()
            .set_modified(submitted.into())
            .unwrap();

        let out = tmp.child("hw1.csv");
        let msg = export_assignment(&config, &accounts, "PZS0001", "mathclass", "hw1", out.path())
            .unwrap();
        assert_eq!(msg.text, format!("Exported 1 submission to {}", out.path().display()));
        out.assert(
            "User,Name,Submitted,Size,Late\nalice,alice,2023-01-11T00:00:00+00:00,8,yes\n",
        );
    }
}
