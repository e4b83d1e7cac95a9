//! Turns the directory layout into listings.
//!
//! `root/<project>/<class>/<assignment>/<submission>/`, where a class is marked
//! by the class marker file and an assignment by its metadata file. Nothing
//! here writes to the filesystem.

use std::{
    fs,
    os::unix::fs::MetadataExt,
    path::{Path, PathBuf},
};

use crate::{
    accounts::Accounts,
    config::DashboardConfig,
    error::{DashboardError, Result},
    markers::{is_assignment_dir, is_class_dir, is_open},
    messages::{Message, Severity},
    metadata::{created_or_mtime, read_meta},
    role::role_for,
    types::{
        sort_assignments_by_urgency, sort_classes, sort_submissions, AssignmentInfo, ClassInfo,
        Listing, SubmissionInfo,
    },
    util::{check_component, dir_size, is_readable, list_subdirs, modified},
};

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Fails with 404 / 403 unless `dir` exists and can be read.
fn check_accessible(dir: &Path) -> Result<()> {
    if !dir.exists() {
        return Err(DashboardError::NotFound {
            path: dir.to_path_buf(),
        });
    }
    if !is_readable(dir) {
        return Err(DashboardError::PermissionDenied {
            path: dir.to_path_buf(),
        });
    }
    Ok(())
}

/// `root/<group>` for every group that has a project directory.
pub fn project_paths(config: &DashboardConfig, groups: &[String]) -> Vec<PathBuf> {
    groups
        .iter()
        .map(|g| config.project_dir(g))
        .filter(|p| {
            let keep = p.is_dir();
            if !keep {
                tracing::debug!(path = %p.display(), "no project directory for group");
            }
            keep
        })
        .collect()
}

/// Every class the current user can reach through group membership, newest
/// first.
pub fn scan_all(config: &DashboardConfig, accounts: &Accounts) -> Listing<ClassInfo> {
    let mut listing = Listing::new();

    let (groups, warning) = accounts.groups();
    listing.messages.extend(warning);

    let projects = project_paths(config, &groups);
    if projects.is_empty() {
        listing.messages.push(Message::danger(
            "user does not have access to any project directories",
        ));
    }

    for project in projects.iter() {
        match classes_in_project(config, accounts, project) {
            Ok(found) => {
                listing.rows.extend(found.rows);
                listing.messages.extend(found.messages);
            }
            Err(e) => {
                tracing::warn!(project = %project.display(), "skipping project: {}", e);
                listing.messages.push(Message::warning(e.to_string()));
            }
        }
    }

    sort_classes(&mut listing.rows);
    listing
}

/// Classes of a single project, newest first.
pub fn scan_project(
    config: &DashboardConfig,
    accounts: &Accounts,
    project: &str,
) -> Result<Listing<ClassInfo>> {
    check_component(project)?;
    let project_path = config.project_dir(project);
    check_accessible(&project_path)?;
    let mut listing = classes_in_project(config, accounts, &project_path)?;
    sort_classes(&mut listing.rows);
    Ok(listing)
}

fn classes_in_project(
    config: &DashboardConfig,
    accounts: &Accounts,
    project_path: &Path,
) -> Result<Listing<ClassInfo>> {
    let mut listing = Listing::new();
    let children = list_subdirs(project_path)
        .map_err(|e| DashboardError::from_io("listing", project_path, e))?;
    for dir in children.iter().filter(|d| is_class_dir(config, d)) {
        match build_class(config, accounts, dir) {
            Ok(class) => listing.rows.push(class),
            Err(e) => {
                tracing::warn!(class = %dir.display(), "skipping class: {}", e);
                listing.messages.push(Message::warning(e.to_string()));
            }
        }
    }
    Ok(listing)
}

pub fn build_class(
    config: &DashboardConfig,
    accounts: &Accounts,
    class_dir: &Path,
) -> Result<ClassInfo> {
    let meta =
        fs::metadata(class_dir).map_err(|e| DashboardError::from_io("reading", class_dir, e))?;
    let marker = class_dir.join(&config.class_marker);
    let created = modified(&marker).map_err(|e| DashboardError::from_io("reading", &marker, e))?;

    let assignments: Vec<PathBuf> = list_subdirs(class_dir)
        .map_err(|e| DashboardError::from_io("listing", class_dir, e))?
        .into_iter()
        .filter(|a| is_assignment_dir(config, a))
        .collect();

    let mut submissions = Vec::new();
    for assignment in assignments.iter() {
        match list_subdirs(assignment) {
            Ok(mut subs) => submissions.append(&mut subs),
            Err(e) => tracing::debug!(
                assignment = %assignment.display(),
                "cannot list submissions: {}",
                e
            ),
        }
    }

    Ok(ClassInfo {
        path: class_dir.to_path_buf(),
        name: file_name(class_dir),
        project: class_dir.parent().map(file_name).unwrap_or_default(),
        instructor: accounts.display_name(&meta.uid().to_string()),
        role: role_for(class_dir)?,
        assignments,
        submissions,
        created,
    })
}

/// Path of a class directory after the 404 / 403 / 401 checks.
pub fn open_class(config: &DashboardConfig, project: &str, class: &str) -> Result<PathBuf> {
    check_component(project)?;
    check_component(class)?;
    let class_path = config.class_dir(project, class);
    check_accessible(&class_path)?;
    if !is_class_dir(config, &class_path) {
        return Err(DashboardError::NotHomeworkDirectory { path: class_path });
    }
    Ok(class_path)
}

/// Path of an assignment directory after the class checks and its own.
pub fn open_assignment(
    config: &DashboardConfig,
    project: &str,
    class: &str,
    assignment: &str,
) -> Result<PathBuf> {
    open_class(config, project, class)?;
    check_component(assignment)?;
    let assignment_path = config.assignment_dir(project, class, assignment);
    check_accessible(&assignment_path)?;
    if !is_assignment_dir(config, &assignment_path) {
        return Err(DashboardError::NotAssignmentDirectory {
            path: assignment_path,
        });
    }
    Ok(assignment_path)
}

/// A class and its assignments, most urgent first.
pub fn scan_class(
    config: &DashboardConfig,
    accounts: &Accounts,
    project: &str,
    class: &str,
) -> Result<(ClassInfo, Listing<AssignmentInfo>)> {
    let class_path = open_class(config, project, class)?;
    let info = build_class(config, accounts, &class_path)?;

    let mut listing = Listing::new();
    for assignment in info.assignments.iter() {
        match build_assignment(config, assignment) {
            Ok(a) => listing.rows.push(a),
            Err(e) => {
                tracing::warn!(assignment = %assignment.display(), "skipping assignment: {}", e);
                listing.messages.push(Message::warning(e.to_string()));
            }
        }
    }
    sort_assignments_by_urgency(&mut listing.rows);
    Ok((info, listing))
}

/// `dir` must already be known to hold the metadata file.
pub fn build_assignment(config: &DashboardConfig, dir: &Path) -> Result<AssignmentInfo> {
    let meta_path = dir.join(&config.assignment_metadata);
    let meta = read_meta(&meta_path)?;
    let created = created_or_mtime(&meta, &meta_path)?;
    let submissions = list_subdirs(dir).map_err(|e| DashboardError::from_io("listing", dir, e))?;

    let class_dir = dir.parent();
    Ok(AssignmentInfo {
        path: dir.to_path_buf(),
        name: file_name(dir),
        class: class_dir.map(file_name).unwrap_or_default(),
        project: class_dir
            .and_then(Path::parent)
            .map(file_name)
            .unwrap_or_default(),
        open: is_open(config, dir),
        submissions,
        created,
        due: meta.due,
    })
}

/// An assignment and its submissions, ordered by submitter name.
pub fn scan_assignment(
    config: &DashboardConfig,
    accounts: &Accounts,
    project: &str,
    class: &str,
    assignment: &str,
) -> Result<(AssignmentInfo, Listing<SubmissionInfo>)> {
    let assignment_path = open_assignment(config, project, class, assignment)?;
    let info = build_assignment(config, &assignment_path)?;

    let mut listing = Listing::new();
    if info.due.is_none() {
        listing.messages.push(Message::new(
            Severity::Info,
            "no valid due date, lateness not tracked",
        ));
    }
    for submission in info.submissions.iter() {
        match build_submission(accounts, submission, &info) {
            Ok(s) => listing.rows.push(s),
            Err(e) => {
                tracing::warn!(submission = %submission.display(), "skipping submission: {}", e);
                listing.messages.push(Message::warning(e.to_string()));
            }
        }
    }
    sort_submissions(&mut listing.rows);
    Ok((info, listing))
}

pub fn build_submission(
    accounts: &Accounts,
    dir: &Path,
    assignment: &AssignmentInfo,
) -> Result<SubmissionInfo> {
    let user = file_name(dir);
    let submitted = modified(dir).map_err(|e| DashboardError::from_io("reading", dir, e))?;
    Ok(SubmissionInfo {
        path: dir.to_path_buf(),
        submitter: accounts.display_name(&user),
        user,
        size: dir_size(dir)?,
        submitted,
        late: assignment.is_late(submitted),
    })
}

#[cfg(test)]
mod tests {
    use std::{
        fs::File,
        io::Result as IoResult,
        os::unix::fs::symlink,
        time::SystemTime,
    };

    use assert_fs::{fixture::ChildPath, prelude::*};
    use chrono::{DateTime, TimeZone, Utc};

    use super::*;

    fn one_group() -> IoResult<Vec<String>> {
        Ok(vec![String::from("PZS0001"), String::from("PZS9999")])
    }

    fn no_groups() -> IoResult<Vec<String>> {
        Ok(Vec::new())
    }

    fn names(key: &str) -> Option<String> {
        match key {
            "alice" => Some(String::from("Alice Liddell")),
            "bob" => Some(String::from("bob Builder")),
            _ => None,
        }
    }

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 1, d, 0, 0, 0).unwrap()
    }

    fn set_mtime(path: &Path, time: DateTime<Utc>) {
        File::open(path)
            .unwrap()
            .set_modified(SystemTime::from(time))
            .unwrap();
    }

    fn fixture() -> (assert_fs::TempDir, DashboardConfig) {
        let tmp = assert_fs::TempDir::new().unwrap();
        let config = DashboardConfig {
            projects_root: tmp.path().to_path_buf(),
            ..DashboardConfig::default()
        };
        (tmp, config)
    }

    fn make_class(config: &DashboardConfig, class: &ChildPath, created: DateTime<Utc>) {
        let marker = class.child(&config.class_marker);
        marker.touch().unwrap();
        set_mtime(marker.path(), created);
    }

    fn make_assignment(config: &DashboardConfig, assignment: &ChildPath, meta: &str) {
        assignment
            .child(&config.assignment_metadata)
            .write_str(meta)
            .unwrap();
    }

    #[test]
    fn late_and_on_time_end_to_end() {
        let (tmp, config) = fixture();
        let accounts = Accounts::new(one_group, names);
        let class = tmp.child("PZS0001/mathclass");
        make_class(&config, &class, day(1));
        let hw1 = class.child("hw1");
        make_assignment(&config, &hw1, "Created: 2023-01-01\nDue: 2023-01-10\n");
        let alice = hw1.child("alice");
        alice.child("answers.txt").write_str("42").unwrap();
        set_mtime(alice.path(), day(11));

        let all = scan_all(&config, &accounts);
        assert!(all.messages.is_empty(), "{:?}", all.messages);
        assert_eq!(all.rows.len(), 1);
        assert_eq!(all.rows[0].name, "mathclass");
        assert_eq!(all.rows[0].project, "PZS0001");
        assert_eq!(all.rows[0].assignments, vec![hw1.path().to_path_buf()]);
        assert_eq!(all.rows[0].submissions, vec![alice.path().to_path_buf()]);

        let (info, subs) =
            scan_assignment(&config, &accounts, "PZS0001", "mathclass", "hw1").unwrap();
        assert_eq!(info.due, Some(day(10)));
        assert_eq!(subs.rows.len(), 1);
        assert_eq!(subs.rows[0].submitter, "Alice Liddell");
        assert_eq!(subs.rows[0].user, "alice");
        assert_eq!(subs.rows[0].size, 2);
        assert!(subs.rows[0].late);

        set_mtime(alice.path(), day(9));
        let (_, subs) =
            scan_assignment(&config, &accounts, "PZS0001", "mathclass", "hw1").unwrap();
        assert!(!subs.rows[0].late);
    }

    #[test]
    fn unparsable_due_means_nobody_is_late() {
        let (tmp, config) = fixture();
        let accounts = Accounts::new(one_group, names);
        let class = tmp.child("PZS0001/mathclass");
        make_class(&config, &class, day(1));
        let hw = class.child("hw2");
        make_assignment(&config, &hw, "Created: 2023-01-01\nDue: whenever\n");
        for (who, d) in [("alice", 5), ("bob", 28)] {
            let sub = hw.child(who);
            sub.create_dir_all().unwrap();
            set_mtime(sub.path(), day(d));
        }

        let (info, subs) =
            scan_assignment(&config, &accounts, "PZS0001", "mathclass", "hw2").unwrap();
        assert_eq!(info.due, None);
        assert_eq!(subs.rows.len(), 2);
        assert!(subs.rows.iter().all(|s| !s.late));
    }

    #[test]
    fn directories_without_marker_are_not_classes() {
        let (tmp, config) = fixture();
        let accounts = Accounts::new(one_group, names);
        make_class(&config, &tmp.child("PZS0001/real"), day(1));
        let copy = tmp.child("PZS0001/lookalike");
        make_assignment(&config, &copy.child("hw1"), "Created: 2023-01-01\nDue: \n");
        tmp.child("PZS0001/README").write_str("hi").unwrap();

        let listing = scan_project(&config, &accounts, "PZS0001").unwrap();
        let names: Vec<_> = listing.rows.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["real"]);

        let err = scan_class(&config, &accounts, "PZS0001", "lookalike").unwrap_err();
        assert_eq!(err.status(), 401);
    }

    #[test]
    fn classes_are_newest_first() {
        let (tmp, config) = fixture();
        let accounts = Accounts::new(one_group, names);
        make_class(&config, &tmp.child("PZS0001/middle"), day(2));
        make_class(&config, &tmp.child("PZS0001/oldest"), day(1));
        make_class(&config, &tmp.child("PZS0001/newest"), day(3));

        let listing = scan_all(&config, &accounts);
        let names: Vec<_> = listing.rows.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["newest", "middle", "oldest"]);
        assert_eq!(listing.rows[0].created, day(3));
    }

    #[test]
    fn no_projects_is_a_warning_not_an_error() {
        let (_tmp, config) = fixture();
        let listing = scan_all(&config, &Accounts::new(no_groups, names));
        assert!(listing.rows.is_empty());
        assert_eq!(
            listing.messages,
            vec![Message::danger("user does not have access to any project directories")]
        );
    }

    #[test]
    fn missing_paths_are_not_found() {
        let (tmp, config) = fixture();
        let accounts = Accounts::new(one_group, names);
        make_class(&config, &tmp.child("PZS0001/mathclass"), day(1));

        assert_eq!(scan_project(&config, &accounts, "PZS0404").unwrap_err().status(), 404);
        assert_eq!(
            scan_class(&config, &accounts, "PZS0001", "history").unwrap_err().status(),
            404
        );
        assert_eq!(
            scan_assignment(&config, &accounts, "PZS0001", "mathclass", "hw9")
                .unwrap_err()
                .status(),
            404
        );
    }

    #[test]
    fn class_view_is_most_urgent_first() {
        let (tmp, config) = fixture();
        let accounts = Accounts::new(one_group, names);
        let class = tmp.child("PZS0001/mathclass");
        make_class(&config, &class, day(1));
        make_assignment(&config, &class.child("hw1"), "Created: 2023-01-01\nDue: 2023-01-10\n");
        make_assignment(&config, &class.child("hw2"), "Created: 2023-01-12\nDue: \n");
        make_assignment(&config, &class.child("hw3"), "Created: 2023-01-05\nDue: 2023-01-20\n");
        // not an assignment
        class.child("scratch/bob").create_dir_all().unwrap();
        class.child(&config.open_sentinel).touch().unwrap();
        class.child("hw3").child(&config.open_sentinel).touch().unwrap();

        let (info, listing) = scan_class(&config, &accounts, "PZS0001", "mathclass").unwrap();
        assert_eq!(info.assignments.len(), 3);
        let names: Vec<_> = listing.rows.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["hw3", "hw2", "hw1"]);
        assert!(listing.rows[0].open);
        assert!(!listing.rows[1].open);
        assert_eq!(listing.rows[0].class, "mathclass");
        assert_eq!(listing.rows[0].project, "PZS0001");
    }

    #[test]
    fn submission_size_and_order() {
        let (tmp, config) = fixture();
        let accounts = Accounts::new(one_group, names);
        let class = tmp.child("PZS0001/mathclass");
        make_class(&config, &class, day(1));
        let hw = class.child("hw1");
        make_assignment(&config, &hw, "Created: 2023-01-01\nDue: 2023-01-10\n");
        tmp.child("big.bin").write_binary(&[0u8; 4096]).unwrap();
        let bob = hw.child("bob");
        bob.child("a.txt").write_binary(&[b'a'; 10]).unwrap();
        bob.child("sub/b.txt").write_binary(&[b'b'; 20]).unwrap();
        symlink(tmp.child("big.bin").path(), bob.child("c.bin").path()).unwrap();
        hw.child("alice").create_dir_all().unwrap();
        hw.child("zed").create_dir_all().unwrap();
        // a stray file next to the submissions is ignored
        hw.child("notes.txt").write_str("x").unwrap();

        let (_, listing) =
            scan_assignment(&config, &accounts, "PZS0001", "mathclass", "hw1").unwrap();
        let order: Vec<_> = listing.rows.iter().map(|s| s.submitter.as_str()).collect();
        assert_eq!(order, vec!["Alice Liddell", "bob Builder", "zed"]);
        assert_eq!(listing.rows[1].size, 30);
    }
}
