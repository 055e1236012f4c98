//! Model Tests
//!
//! Tests for the lookups and constraints built on the document store.

use squidgate::config::Config;
use squidgate::models::{
    self, authenticate, create_record, create_user, delete_user, ensure_admin,
    find_record_by_fqdn, find_records_for_owner, find_user_by_email, resolve_upstream,
    set_password, update_record, Owner, Record, RecordEdit, RecordRequest, User, ADMIN_EMAIL,
};
use squidgate::{Store, StoreError};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_store() -> (TempDir, Store) {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .db_file(temp_dir.path().join("gateway.db"))
        .build();
    let store = Store::open(config).unwrap();
    (temp_dir, store)
}

fn saved_user(store: &Store, email: &str, password: &str) -> User {
    let mut user = User::new(email, password).unwrap();
    store.save(&mut user).unwrap();
    user
}

fn saved_record(store: &Store, owner: &User, fqdn: &str, port: u16) -> Record {
    let owner = Owner {
        id: owner.id.clone(),
        email: owner.email.clone(),
    };
    let mut record = Record::new(owner, fqdn, "10.0.0.5", port, "http", models::unix_now());
    store.save(&mut record).unwrap();
    record
}

fn request(fqdn: &str, port: u16) -> RecordRequest {
    RecordRequest {
        fqdn: fqdn.to_string(),
        handler_host: "10.0.0.7".to_string(),
        handler_port: port,
        handler_protocol: "https".to_string(),
    }
}

// =============================================================================
// Record Lookup Tests
// =============================================================================

#[test]
fn test_find_record_by_fqdn_hit() {
    let (_temp, store) = setup_temp_store();
    let owner = saved_user(&store, "owner@example.com", "pw");

    saved_record(&store, &owner, "a.example.com", 8080);
    let b = saved_record(&store, &owner, "b.example.com", 9090);

    let found = find_record_by_fqdn(&store, "b.example.com").unwrap();
    assert_eq!(found, b);
}

#[test]
fn test_find_record_by_fqdn_miss_is_empty_not_error() {
    let (_temp, store) = setup_temp_store();

    // No record type saved yet
    let found = find_record_by_fqdn(&store, "nowhere.example.com").unwrap();
    assert!(found.is_empty());
    assert_eq!(found, Record::default());

    let owner = saved_user(&store, "owner@example.com", "pw");
    saved_record(&store, &owner, "a.example.com", 8080);

    let found = find_record_by_fqdn(&store, "nowhere.example.com").unwrap();
    assert!(found.is_empty());
}

#[test]
fn test_find_records_for_owner() {
    let (_temp, store) = setup_temp_store();
    let alice = saved_user(&store, "alice@example.com", "pw");
    let bob = saved_user(&store, "bob@example.com", "pw");

    saved_record(&store, &alice, "a1.example.com", 1);
    saved_record(&store, &alice, "a2.example.com", 2);
    saved_record(&store, &bob, "b1.example.com", 3);

    let alice_records = find_records_for_owner(&store, &alice.id).unwrap();
    assert_eq!(alice_records.len(), 2);
    assert!(alice_records.iter().all(|r| r.owner.id == alice.id));

    let nobody = find_records_for_owner(&store, "nobody").unwrap();
    assert!(nobody.is_empty());
}

#[test]
fn test_resolve_upstream() {
    let (_temp, store) = setup_temp_store();
    let owner = saved_user(&store, "owner@example.com", "pw");

    let mut record = saved_record(&store, &owner, "app.example.com", 8443);
    assert_eq!(
        resolve_upstream(&store, "app.example.com").unwrap(),
        Some("http://10.0.0.5:8443".to_string())
    );
    assert_eq!(resolve_upstream(&store, "other.example.com").unwrap(), None);

    record.blacklist = true;
    store.save(&mut record).unwrap();
    assert_eq!(resolve_upstream(&store, "app.example.com").unwrap(), None);
}

// =============================================================================
// User Tests
// =============================================================================

#[test]
fn test_find_user_by_email() {
    let (_temp, store) = setup_temp_store();
    let user = saved_user(&store, "carol@example.com", "pw");

    let found = find_user_by_email(&store, "carol@example.com").unwrap();
    assert_eq!(found, user);

    let missing = find_user_by_email(&store, "dave@example.com").unwrap();
    assert!(missing.is_empty());
}

#[test]
fn test_new_user_hashes_password() {
    let user = User::new("erin@example.com", "s3cret").unwrap();

    assert!(user.id.is_empty());
    assert_ne!(user.hash, "s3cret");
    assert!(user.verify_password("s3cret"));
    assert!(!user.verify_password("wrong"));
    assert_eq!(user.created_at, user.updated_at);
}

#[test]
fn test_authenticate() {
    let (_temp, store) = setup_temp_store();
    let user = saved_user(&store, "frank@example.com", "letmein");

    let ok = authenticate(&store, "frank@example.com", "letmein").unwrap();
    assert_eq!(ok.map(|u| u.id), Some(user.id));

    assert!(authenticate(&store, "frank@example.com", "nope")
        .unwrap()
        .is_none());
    assert!(authenticate(&store, "ghost@example.com", "letmein")
        .unwrap()
        .is_none());
}

#[test]
fn test_set_password_updates_hash_only() {
    let (_temp, store) = setup_temp_store();
    let user = saved_user(&store, "gina@example.com", "old");

    let mut target = User {
        id: user.id.clone(),
        ..User::default()
    };
    set_password(&store, &mut target, "new").unwrap();

    assert_eq!(target.email, "gina@example.com");
    assert_eq!(target.created_at, user.created_at);
    assert!(target.verify_password("new"));
    assert!(!target.verify_password("old"));

    let mut fetched = User {
        id: user.id.clone(),
        ..User::default()
    };
    store.get(&mut fetched).unwrap();
    assert_eq!(fetched, target);
}

#[test]
fn test_set_password_unknown_user() {
    let (_temp, store) = setup_temp_store();
    saved_user(&store, "hank@example.com", "pw");

    let mut ghost = User {
        id: "ghost".to_string(),
        ..User::default()
    };
    let err = set_password(&store, &mut ghost, "pw").unwrap_err();

    assert!(matches!(err, StoreError::NotFound { kind: "User", .. }));
}

#[test]
fn test_create_user_rejects_taken_email() {
    let (_temp, store) = setup_temp_store();

    let user = create_user(&store, "kim@example.com", "pw").unwrap();
    assert!(!user.id.is_empty());
    assert!(user.verify_password("pw"));

    let err = create_user(&store, "kim@example.com", "other").unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));
    assert_eq!(store.keys(&User::default()).unwrap(), vec![user.id]);
}

#[test]
fn test_create_user_requires_email_and_password() {
    let (_temp, store) = setup_temp_store();

    assert!(matches!(
        create_user(&store, "", "pw").unwrap_err(),
        StoreError::InvalidRequest(_)
    ));
    assert!(matches!(
        create_user(&store, "lee@example.com", "").unwrap_err(),
        StoreError::InvalidRequest(_)
    ));
    assert!(store.keys(&User::default()).unwrap().is_empty());
}

// =============================================================================
// Record Mutation Tests
// =============================================================================

#[test]
fn test_create_record_fills_owner_and_timestamps() {
    let (_temp, store) = setup_temp_store();
    let owner = saved_user(&store, "mo@example.com", "pw");

    let record = create_record(&store, &owner.id, &request("mo.example.com", 8443)).unwrap();

    assert!(!record.is_empty());
    assert_eq!(record.owner.id, owner.id);
    assert_eq!(record.owner.email, "mo@example.com");
    assert_eq!(record.created_at, record.updated_at);
    assert_eq!(record.upstream_url(), "https://10.0.0.7:8443");
    assert_eq!(find_record_by_fqdn(&store, "mo.example.com").unwrap(), record);
}

#[test]
fn test_create_record_rejects_duplicate_fqdn() {
    let (_temp, store) = setup_temp_store();
    let owner = saved_user(&store, "ned@example.com", "pw");

    create_record(&store, &owner.id, &request("dup.example.com", 80)).unwrap();
    let err = create_record(&store, &owner.id, &request("dup.example.com", 81)).unwrap_err();

    assert!(matches!(err, StoreError::Conflict(_)));
    assert_eq!(find_records_for_owner(&store, &owner.id).unwrap().len(), 1);
}

#[test]
fn test_create_record_requires_existing_owner() {
    let (_temp, store) = setup_temp_store();
    saved_user(&store, "olga@example.com", "pw");

    let err = create_record(&store, "ghost", &request("olga.example.com", 80)).unwrap_err();

    assert!(matches!(err, StoreError::NotFound { kind: "User", .. }));
    assert!(find_record_by_fqdn(&store, "olga.example.com")
        .unwrap()
        .is_empty());
}

#[test]
fn test_create_record_validates_request() {
    let (_temp, store) = setup_temp_store();
    let owner = saved_user(&store, "pat@example.com", "pw");

    let mut bad_host = request("pat.example.com", 80);
    bad_host.handler_host = "backend.internal".to_string();
    assert!(matches!(
        create_record(&store, &owner.id, &bad_host).unwrap_err(),
        StoreError::InvalidRequest(_)
    ));

    let mut bad_protocol = request("pat.example.com", 80);
    bad_protocol.handler_protocol = "ftp".to_string();
    assert!(matches!(
        create_record(&store, &owner.id, &bad_protocol).unwrap_err(),
        StoreError::InvalidRequest(_)
    ));

    assert!(matches!(
        create_record(&store, &owner.id, &request("", 80)).unwrap_err(),
        StoreError::InvalidRequest(_)
    ));
}

#[test]
fn test_update_record_changes_named_fields() {
    let (_temp, store) = setup_temp_store();
    let owner = saved_user(&store, "quin@example.com", "pw");
    let record = create_record(&store, &owner.id, &request("quin.example.com", 80)).unwrap();

    let edit = RecordEdit {
        handler_port: Some(9000),
        blacklist: Some(true),
        ..RecordEdit::default()
    };
    let updated = update_record(&store, &record.id, &edit).unwrap();

    assert_eq!(updated.handler_port, 9000);
    assert!(updated.blacklist);
    assert_eq!(updated.fqdn, record.fqdn);
    assert_eq!(updated.created_at, record.created_at);
    assert!(updated.updated_at >= record.updated_at);

    let mut fetched = Record {
        id: record.id.clone(),
        ..Record::default()
    };
    store.get(&mut fetched).unwrap();
    assert_eq!(fetched, updated);
}

#[test]
fn test_update_record_rejects_taken_fqdn() {
    let (_temp, store) = setup_temp_store();
    let owner = saved_user(&store, "rae@example.com", "pw");
    let first = create_record(&store, &owner.id, &request("one.example.com", 80)).unwrap();
    create_record(&store, &owner.id, &request("two.example.com", 80)).unwrap();

    let taken = RecordEdit {
        fqdn: Some("two.example.com".to_string()),
        ..RecordEdit::default()
    };
    let err = update_record(&store, &first.id, &taken).unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));

    // Keeping its own hostname is not a conflict
    let same = RecordEdit {
        fqdn: Some("one.example.com".to_string()),
        ..RecordEdit::default()
    };
    update_record(&store, &first.id, &same).unwrap();
}

#[test]
fn test_update_record_unknown_record_or_owner() {
    let (_temp, store) = setup_temp_store();
    let owner = saved_user(&store, "sam@example.com", "pw");
    let record = create_record(&store, &owner.id, &request("sam.example.com", 80)).unwrap();

    let err = update_record(&store, "missing", &RecordEdit::default()).unwrap_err();
    assert!(matches!(err, StoreError::NotFound { kind: "Record", .. }));

    let reassign = RecordEdit {
        owner_id: Some("ghost".to_string()),
        ..RecordEdit::default()
    };
    let err = update_record(&store, &record.id, &reassign).unwrap_err();
    assert!(matches!(err, StoreError::NotFound { kind: "User", .. }));
}

// =============================================================================
// Ownership Constraint Tests
// =============================================================================

#[test]
fn test_delete_user_refused_while_owning_records() {
    let (_temp, store) = setup_temp_store();
    let owner = saved_user(&store, "ivy@example.com", "pw");
    let record = saved_record(&store, &owner, "ivy.example.com", 80);

    let err = delete_user(&store, &owner).unwrap_err();
    match err {
        StoreError::OwnershipConflict { user_id, records } => {
            assert_eq!(user_id, owner.id);
            assert_eq!(records, 1);
        }
        other => panic!("Expected OwnershipConflict, got {:?}", other),
    }
    assert!(store.exists(&owner).unwrap());

    store.delete(&record).unwrap();
    delete_user(&store, &owner).unwrap();
    assert!(!store.exists(&owner).unwrap());
}

#[test]
fn test_reassign_records_then_delete_user() {
    let (_temp, store) = setup_temp_store();
    let leaving = saved_user(&store, "tom@example.com", "pw");
    let staying = saved_user(&store, "una@example.com", "pw");
    let record = create_record(&store, &leaving.id, &request("tom.example.com", 80)).unwrap();

    assert!(matches!(
        delete_user(&store, &leaving).unwrap_err(),
        StoreError::OwnershipConflict { .. }
    ));

    let reassign = RecordEdit {
        owner_id: Some(staying.id.clone()),
        ..RecordEdit::default()
    };
    let moved = update_record(&store, &record.id, &reassign).unwrap();
    assert_eq!(moved.owner.id, staying.id);
    assert_eq!(moved.owner.email, "una@example.com");

    delete_user(&store, &leaving).unwrap();
    assert!(!store.exists(&leaving).unwrap());
    assert_eq!(find_records_for_owner(&store, &staying.id).unwrap().len(), 1);
}

// =============================================================================
// Bootstrap Tests
// =============================================================================

#[test]
fn test_ensure_admin_only_on_empty_store() {
    let (_temp, store) = setup_temp_store();

    let password = ensure_admin(&store).unwrap().expect("admin should be created");
    assert_eq!(password.len(), 10);
    assert!(password.chars().all(|c| c.is_ascii_alphanumeric()));

    let admin = authenticate(&store, ADMIN_EMAIL, &password).unwrap();
    assert!(admin.is_some());

    assert_eq!(ensure_admin(&store).unwrap(), None);
    assert_eq!(store.keys(&User::default()).unwrap().len(), 1);
}

#[test]
fn test_ensure_admin_skipped_when_users_exist() {
    let (_temp, store) = setup_temp_store();
    saved_user(&store, "jack@example.com", "pw");

    assert_eq!(ensure_admin(&store).unwrap(), None);
    assert!(find_user_by_email(&store, ADMIN_EMAIL).unwrap().is_empty());
}
