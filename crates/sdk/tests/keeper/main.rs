mod ingest;
mod reconcile;
mod referral;
mod requests;
