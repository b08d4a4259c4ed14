use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct SelectTx;

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct SelectTxOk;

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct Commit;

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct CommitOk;

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct Rollback;

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct RollbackOk;
