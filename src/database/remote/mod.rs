// Remote gateway for the Supabase backend.
//
// `common` owns the transport: the `RemoteGateway` trait (so the sync
// engine and tests can swap the backend) and the `SupabaseClient`
// implementation over the REST (PostgREST) and Storage APIs.
//
// Each entity module owns the one typed mapping between the remote row
// shape and the local record shape, plus thin select/upsert/delete
// wrappers. No field names leak past these modules.

pub mod common;

pub mod documents;
pub mod estates;
pub mod guidance;
pub mod journal;
pub mod tasks;
