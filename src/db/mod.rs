//! Database layer (Firestore).
//!
//! Credentials live in one collection per provider (`strava`, `spotify`),
//! keyed by user id. Collection names come from `Provider::collection()`.

pub mod firestore;

pub use firestore::FirestoreDb;
