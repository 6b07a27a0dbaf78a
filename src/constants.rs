//! # System Constants
//!
//! Wire-level sentinels and the operation names used in structured logs.

/// Ledger wire constants
pub mod ledger {
    /// Literal the chaincode returns for an empty collection
    pub const NULL_SENTINEL: &str = "null";

    /// Empty id argument: the chaincode assigns the key
    pub const ASSIGN_ID: &str = "";

    pub const DEFAULT_CHANNEL: &str = "mychannel";

    pub const DEFAULT_CHAINCODE: &str = "mycc";
}

/// Operation names attached to log records and saga reports
pub mod operations {
    pub const REGISTER: &str = "register";
    pub const LOGIN: &str = "login";
    pub const ATTACH_PUBLIC_KEY: &str = "attach_public_key";
    pub const SET_VERIFICATION: &str = "set_verification";
    pub const DELETE_USER: &str = "delete_user";
    pub const CREATE_TASK: &str = "create_task";
    pub const POST_TASK: &str = "post_task";
    pub const ACCEPT_TASK: &str = "accept_task";
    pub const ADVANCE_ROUND: &str = "advance_round";
    pub const FINISH_TASK: &str = "finish_task";
    pub const DELETE_TASK: &str = "delete_task";
    pub const DISTRIBUTE: &str = "distribute";
    pub const FINISH_AND_DISTRIBUTE: &str = "finish_and_distribute";
    pub const SETTLE_FINISHED: &str = "settle_finished";
    pub const UPLOAD_MODEL: &str = "upload_model";
}
