// std
use std::{env, fs, process};
// self
use oauth2_account::{
	_preludet::*,
	auth::{Credential, TokenSecret},
	store::{CredentialStore, FileStore, MemoryStore},
};

fn credential(access: &str, refresh: Option<&str>) -> Credential {
	Credential::new(TokenSecret::new(access), refresh.map(TokenSecret::new))
}

async fn exercise_contract(store: &dyn CredentialStore) {
	let alice = identity("alice", "com.example");
	let bob = identity("bob", "com.example");
	let carol = identity("carol", "org.other");

	assert!(store.refresh_token(&alice).await.expect("Lookup should succeed.").is_none());
	assert!(store.access_token(&alice).await.expect("Lookup should succeed.").is_none());

	store
		.set_credential(&alice, credential("a0", Some("r1")))
		.await
		.expect("Saving a credential should succeed.");
	store.set_credential(&bob, credential("b0", Some("rb"))).await.expect("Save should succeed.");
	store.set_credential(&carol, credential("c0", None)).await.expect("Save should succeed.");

	// Identities of different account types never share entries.
	assert_eq!(
		store.identities(Some(&alice.account_type)).await.expect("Listing should succeed."),
		vec![alice.clone(), bob.clone()]
	);
	assert_eq!(store.identities(None).await.expect("Listing should succeed.").len(), 3);

	store
		.set_credential(&alice, credential("a1", Some("r2")))
		.await
		.expect("Saving a rotated credential should succeed.");

	assert_eq!(
		store
			.access_token(&alice)
			.await
			.expect("Lookup should succeed.")
			.as_ref()
			.map(TokenSecret::expose),
		Some("a1")
	);
	assert_eq!(
		store
			.refresh_token(&alice)
			.await
			.expect("Lookup should succeed.")
			.as_ref()
			.map(TokenSecret::expose),
		Some("r2")
	);

	// Only the exact current token can be invalidated.
	assert!(
		!store.invalidate_access_token(&alice, "a0").await.expect("Invalidation should succeed.")
	);
	assert!(
		store.invalidate_access_token(&alice, "a1").await.expect("Invalidation should succeed.")
	);
	assert!(store.access_token(&alice).await.expect("Lookup should succeed.").is_none());
	assert!(store.refresh_token(&alice).await.expect("Lookup should succeed.").is_some());

	store
		.set_metadata(&alice, "display_name", "Alice")
		.await
		.expect("Saving metadata should succeed.");

	assert_eq!(
		store.metadata(&alice, "display_name").await.expect("Lookup should succeed.").as_deref(),
		Some("Alice")
	);
	assert!(store.metadata(&bob, "display_name").await.expect("Lookup should succeed.").is_none());

	store.remove(&alice).await.expect("Removal should succeed.");

	assert!(store.refresh_token(&alice).await.expect("Lookup should succeed.").is_none());
	assert!(store.metadata(&alice, "display_name").await.expect("Lookup should succeed.").is_none());
	assert_eq!(
		store
			.access_token(&bob)
			.await
			.expect("Lookup should succeed.")
			.as_ref()
			.map(TokenSecret::expose),
		Some("b0")
	);
	assert!(store.refresh_token(&carol).await.expect("Lookup should succeed.").is_none());
}

#[tokio::test]
async fn memory_store_honors_the_store_contract() {
	exercise_contract(&MemoryStore::default()).await;
}

#[tokio::test]
async fn file_store_honors_the_store_contract() {
	let path = env::temp_dir().join(format!(
		"oauth2_account_store_contract_{}_{}.json",
		process::id(),
		OffsetDateTime::now_utc().unix_timestamp_nanos(),
	));
	let store = FileStore::open(&path).expect("File store should open on a missing snapshot.");

	exercise_contract(&store).await;

	let reopened = FileStore::open(&path).expect("File store should reopen its snapshot.");

	assert_eq!(reopened.identities(None).await.expect("Listing should succeed.").len(), 2);

	fs::remove_file(&path).unwrap_or_else(|e| {
		panic!("Failed to remove temporary file store snapshot {}: {e}", path.display())
	});
}

#[tokio::test]
async fn clones_of_a_memory_store_share_state() {
	let store = MemoryStore::default();
	let clone = store.clone();
	let identity = identity("u1", "com.example");

	store.insert(identity.clone(), credential("a0", Some("r1")));

	assert_eq!(
		clone
			.refresh_token(&identity)
			.await
			.expect("Lookup should succeed.")
			.as_ref()
			.map(TokenSecret::expose),
		Some("r1")
	);
}
