mod test_support;

use serde_json::json;
use test_support::{ids, temp_dir, Sidecar};

#[test]
fn create_update_delete_round_trip() {
    let mut s = Sidecar::with_workspace("gradecalc-students-lifecycle");
    s.teacher_session();

    let created = s.ok(
        "students.create",
        json!({
            "id": " 22A91A0501 ",
            "name": "Ravi Kumar",
            "branch": "cse",
            "section": "B",
            "year": "2nd",
            "marks": [95, "92"],
        }),
    );
    let student = &created["student"];
    assert_eq!(student["id"], json!("22A91A0501"));
    assert_eq!(student["branch"], json!("CSE"));
    assert_eq!(student["year"], json!("2nd"));
    assert_eq!(student["marks"], json!([95, 92]));
    assert_eq!(student["total"], json!(187));
    assert_eq!(student["cgpa"], json!(9.35));
    assert_eq!(student["grade"], json!("A"));
    assert_eq!(student["passwordSet"], json!(false));
    // Not created from the portal form, so no navigation happened.
    assert_eq!(created["portal"], serde_json::Value::Null);

    let updated = s.ok(
        "students.updateMarks",
        json!({ "studentId": "22A91A0501", "marks": [30, 40, 50] }),
    );
    assert_eq!(updated["student"]["marks"], json!([30, 40, 50]));
    assert_eq!(updated["student"]["total"], json!(120));
    assert_eq!(updated["student"]["cgpa"], json!(4.0));
    assert_eq!(updated["student"]["grade"], json!("C"));
    assert_eq!(updated["student"]["name"], json!("Ravi Kumar"));

    let fetched = s.ok("students.get", json!({ "studentId": "22A91A0501" }));
    assert_eq!(fetched["student"], updated["student"]);

    s.ok("students.delete", json!({ "studentId": "22A91A0501" }));
    assert_eq!(
        s.err_code("students.get", json!({ "studentId": "22A91A0501" })),
        "not_found"
    );
    assert_eq!(
        s.err_code("students.delete", json!({ "studentId": "22A91A0501" })),
        "not_found"
    );
}

#[test]
fn create_applies_defaults_and_subject_count() {
    let mut s = Sidecar::with_workspace("gradecalc-students-defaults");
    s.teacher_session();

    let created = s.ok(
        "students.create",
        json!({ "id": "S9", "name": "Asha", "subjectCount": 4, "marks": [81, 82, 83, 84, 85] }),
    );
    let student = &created["student"];
    assert_eq!(student["branch"], json!("CSE"));
    assert_eq!(student["section"], json!("A"));
    assert_eq!(student["year"], json!("1st"));
    assert_eq!(student["marks"], json!([81, 82, 83, 84]));

    let none = s.ok(
        "students.create",
        json!({ "id": "S10", "name": "Nil", "subjectCount": 0 }),
    );
    assert_eq!(none["student"]["marks"], json!([]));
    assert_eq!(none["student"]["grade"], json!("N/A"));
    assert_eq!(none["student"]["cgpa"], json!(0.0));
}

#[test]
fn create_rejects_duplicates_and_bad_input() {
    let mut s = Sidecar::with_workspace("gradecalc-students-errors");
    s.teacher_session();
    s.add_student("S1", "CSE", "A", json!([95, 92]));

    assert_eq!(
        s.err_code(
            "students.create",
            json!({ "id": "S1", "name": "Other", "marks": [10] }),
        ),
        "already_exists"
    );
    // The original record was not overwritten.
    let kept = s.ok("students.get", json!({ "studentId": "S1" }));
    assert_eq!(kept["student"]["marks"], json!([95, 92]));

    assert_eq!(
        s.err_code(
            "students.create",
            json!({ "id": "S2", "name": "X", "branch": "ARTS", "marks": [10] }),
        ),
        "bad_params"
    );
    assert_eq!(
        s.err_code(
            "students.create",
            json!({ "id": "S2", "name": "X", "year": "5th", "marks": [10] }),
        ),
        "bad_params"
    );
    assert_eq!(
        s.err_code("students.create", json!({ "id": " ", "name": "X", "marks": [] })),
        "bad_params"
    );
    assert_eq!(
        s.err_code(
            "students.create",
            json!({ "id": "S2", "name": "X", "marks": "90,80" }),
        ),
        "bad_params"
    );
    assert_eq!(
        s.err_code(
            "students.updateMarks",
            json!({ "studentId": "S404", "marks": [1] }),
        ),
        "not_found"
    );
}

#[test]
fn writes_need_a_teacher_and_reads_need_a_session() {
    let mut s = Sidecar::with_workspace("gradecalc-students-auth");

    assert_eq!(s.err_code("students.list", json!({})), "not_authenticated");
    assert_eq!(
        s.err_code(
            "students.create",
            json!({ "id": "S1", "name": "A", "marks": [1] }),
        ),
        "not_authenticated"
    );

    s.teacher_session();
    s.add_student("S1", "IT", "A", json!([88, 90]));
    s.ok("auth.logout", json!({}));

    s.ok("auth.student.begin", json!({ "studentId": "S1" }));
    s.ok("auth.student.complete", json!({ "password": "s1pass" }));

    let listed = s.ok("students.list", json!({}));
    assert_eq!(ids(&listed["students"]), vec!["S1"]);
    assert_eq!(
        s.err_code(
            "students.updateMarks",
            json!({ "studentId": "S1", "marks": [100, 100] }),
        ),
        "forbidden"
    );
    assert_eq!(
        s.err_code("students.delete", json!({ "studentId": "S1" })),
        "forbidden"
    );
}

#[test]
fn list_filters_by_branch_and_section() {
    let mut s = Sidecar::with_workspace("gradecalc-students-list");
    s.teacher_session();
    s.seed_class();

    let all = s.ok("students.list", json!({}));
    assert_eq!(ids(&all["students"]), vec!["S1", "S2", "S3", "S4", "S5"]);

    let cse = s.ok("students.list", json!({ "criteria": { "branch": "CSE" } }));
    assert_eq!(ids(&cse["students"]), vec!["S1", "S2", "S4"]);

    let cse_a = s.ok(
        "students.list",
        json!({ "criteria": { "branch": "CSE", "section": "A" } }),
    );
    assert_eq!(ids(&cse_a["students"]), vec!["S1", "S2"]);

    let all_again = s.ok(
        "students.list",
        json!({ "criteria": { "branch": "All", "section": "All" } }),
    );
    assert_eq!(all_again["students"].as_array().map(|a| a.len()), Some(5));

    let failed = s.ok("students.list", json!({ "criteria": { "onlyFailed": true } }));
    assert_eq!(ids(&failed["students"]), vec!["S2", "S4"]);
}

#[test]
fn records_persist_across_restart() {
    let workspace = temp_dir("gradecalc-students-persist");
    {
        let mut s = Sidecar::spawn();
        s.ok(
            "workspace.select",
            json!({ "path": workspace.to_string_lossy() }),
        );
        s.teacher_session();
        s.add_student("S1", "ECE", "C", json!([70, 75]));
    }

    let mut s = Sidecar::spawn();
    s.ok(
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    s.ok(
        "auth.teacher.login",
        json!({ "username": "anita rao", "password": "teach123" }),
    );
    let got = s.ok("students.get", json!({ "studentId": "S1" }));
    assert_eq!(got["student"]["branch"], json!("ECE"));
    assert_eq!(got["student"]["section"], json!("C"));
    assert_eq!(got["student"]["total"], json!(145));
    assert_eq!(got["student"]["cgpa"], json!(7.25));
    assert_eq!(got["student"]["grade"], json!("C"));
}
