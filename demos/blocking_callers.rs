//! Demonstrates async tasks, plain threads, and a completion callback all waiting on the same
//! refresh: the slow refresh operation below runs exactly once.

// std
use std::{
	sync::{Arc, mpsc},
	thread,
	time::Duration,
};
// crates.io
use color_eyre::Result;
use tokio::runtime::Runtime;
// self
use oauth2_account::{
	auth::{Credential, Identity, TokenPair, TokenSecret},
	coordinator::{BlockingCoordinator, Coordinator},
	error::Error,
	store::MemoryStore,
};

fn main() -> Result<()> {
	color_eyre::install()?;

	let runtime = Runtime::new()?;
	let store = Arc::new(MemoryStore::default());
	let identity = Identity::parse("alice", "com.example.demo")?;

	store.insert(identity.clone(), Credential::new(TokenSecret::new(""), Some("r1".into())));

	let operation = |identity: Identity, refresh: TokenSecret| async move {
		println!("Refreshing {identity} with a {}-byte refresh token.", refresh.expose().len());
		tokio::time::sleep(Duration::from_millis(200)).await;

		Ok::<_, Error>(TokenPair::new("a1", "r2"))
	};
	let coordinator = Coordinator::new(store, Arc::new(operation));
	let blocking = BlockingCoordinator::new(coordinator.clone(), runtime.handle().clone());
	let (tx, rx) = mpsc::channel();

	coordinator.request_refresh_with(runtime.handle(), &identity, None, move |result| {
		let _ = tx.send(result.map(|credential| credential.access_token));
	});

	let workers: Vec<_> = (0..3)
		.map(|i| {
			let blocking = blocking.clone();
			let identity = identity.clone();

			thread::spawn(move || match blocking.get_token(&identity) {
				Ok(credential) => println!("Thread {i} got {}.", credential.access_token.expose()),
				Err(e) => println!("Thread {i} failed: {e}"),
			})
		})
		.collect();
	let from_callback = rx.recv()??;

	println!("Callback got {}.", from_callback.expose());

	for worker in workers {
		let _ = worker.join();
	}

	println!("Refresh metrics: {:?}.", coordinator.metrics());

	Ok(())
}
