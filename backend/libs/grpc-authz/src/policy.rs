//! Method policy classifier
//!
//! Every RPC the transport can dispatch is a variant of [`Operation`]. Access
//! tier and call shape are exhaustive matches, so adding an operation without
//! deciding its policy does not compile. Paths that are not in the catalogue
//! are rejected by the interceptor (default deny).

use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// Authorization class of an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum AccessTier {
    /// No token required (login, account creation)
    Open,
    /// Caller must be the addressed user or the resource owner
    SelfOnly,
    /// Caller must be the owner or follow the owner
    FollowerOrSelf,
    /// Allowed for any caller when the resource is public, otherwise `FollowerOrSelf`
    PublicOverride,
}

/// How many messages each side sends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CallShape {
    Unary,
    ServerStreaming,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Operation {
    // AuthService
    AuthLogin,

    // Users
    Login,
    CreateUser,
    ActivateUser,
    GetUser,
    SearchUsers,
    GetUserFollowers,
    GetUserFollowing,
    FollowUser,
    AcceptFollow,
    UnfollowUser,
    UpdateUserPass,
    DeleteUser,

    // Conversations
    StartConversation,
    GetUserConversations,
    ReadConversation,
    SendDM,
    GetConversationDMs,

    // Posts
    CreatePost,
    GetPost,
    GetUserPosts,
    GetUserPublicPosts,
    GetFeed,
    RatePostUp,
    RatePostDown,
    UpdatePost,
    DeletePost,

    // Comments
    CreateComment,
    GetComment,
    GetCommentsFromPost,
    RateCommentUp,
    RateCommentDown,
    UpdateComment,
    DeleteComment,
}

static BY_PATH: Lazy<HashMap<&'static str, Operation>> =
    Lazy::new(|| Operation::ALL.iter().map(|op| (op.path(), *op)).collect());

impl Operation {
    pub const ALL: [Operation; 34] = [
        Operation::AuthLogin,
        Operation::Login,
        Operation::CreateUser,
        Operation::ActivateUser,
        Operation::GetUser,
        Operation::SearchUsers,
        Operation::GetUserFollowers,
        Operation::GetUserFollowing,
        Operation::FollowUser,
        Operation::AcceptFollow,
        Operation::UnfollowUser,
        Operation::UpdateUserPass,
        Operation::DeleteUser,
        Operation::StartConversation,
        Operation::GetUserConversations,
        Operation::ReadConversation,
        Operation::SendDM,
        Operation::GetConversationDMs,
        Operation::CreatePost,
        Operation::GetPost,
        Operation::GetUserPosts,
        Operation::GetUserPublicPosts,
        Operation::GetFeed,
        Operation::RatePostUp,
        Operation::RatePostDown,
        Operation::UpdatePost,
        Operation::DeletePost,
        Operation::CreateComment,
        Operation::GetComment,
        Operation::GetCommentsFromPost,
        Operation::RateCommentUp,
        Operation::RateCommentDown,
        Operation::UpdateComment,
        Operation::DeleteComment,
    ];

    /// Look up an operation by its full gRPC path (`/package.Service/Method`)
    pub fn from_path(path: &str) -> Option<Operation> {
        BY_PATH.get(path).copied()
    }

    pub fn path(&self) -> &'static str {
        match self {
            Operation::AuthLogin => "/lenic.AuthService/Login",
            Operation::Login => "/lenic.Lenic/Login",
            Operation::CreateUser => "/lenic.Lenic/CreateUser",
            Operation::ActivateUser => "/lenic.Lenic/ActivateUser",
            Operation::GetUser => "/lenic.Lenic/GetUser",
            Operation::SearchUsers => "/lenic.Lenic/SearchUsers",
            Operation::GetUserFollowers => "/lenic.Lenic/GetUserFollowers",
            Operation::GetUserFollowing => "/lenic.Lenic/GetUserFollowing",
            Operation::FollowUser => "/lenic.Lenic/FollowUser",
            Operation::AcceptFollow => "/lenic.Lenic/AcceptFollow",
            Operation::UnfollowUser => "/lenic.Lenic/UnfollowUser",
            Operation::UpdateUserPass => "/lenic.Lenic/UpdateUserPass",
            Operation::DeleteUser => "/lenic.Lenic/DeleteUser",
            Operation::StartConversation => "/lenic.Lenic/StartConversation",
            Operation::GetUserConversations => "/lenic.Lenic/GetUserConversations",
            Operation::ReadConversation => "/lenic.Lenic/ReadConversation",
            Operation::SendDM => "/lenic.Lenic/SendDM",
            Operation::GetConversationDMs => "/lenic.Lenic/GetConversationDMs",
            Operation::CreatePost => "/lenic.Lenic/CreatePost",
            Operation::GetPost => "/lenic.Lenic/GetPost",
            Operation::GetUserPosts => "/lenic.Lenic/GetUserPosts",
            Operation::GetUserPublicPosts => "/lenic.Lenic/GetUserPublicPosts",
            Operation::GetFeed => "/lenic.Lenic/GetFeed",
            Operation::RatePostUp => "/lenic.Lenic/RatePostUp",
            Operation::RatePostDown => "/lenic.Lenic/RatePostDown",
            Operation::UpdatePost => "/lenic.Lenic/UpdatePost",
            Operation::DeletePost => "/lenic.Lenic/DeletePost",
            Operation::CreateComment => "/lenic.Lenic/CreateComment",
            Operation::GetComment => "/lenic.Lenic/GetComment",
            Operation::GetCommentsFromPost => "/lenic.Lenic/GetCommentsFromPost",
            Operation::RateCommentUp => "/lenic.Lenic/RateCommentUp",
            Operation::RateCommentDown => "/lenic.Lenic/RateCommentDown",
            Operation::UpdateComment => "/lenic.Lenic/UpdateComment",
            Operation::DeleteComment => "/lenic.Lenic/DeleteComment",
        }
    }

    pub fn tier(&self) -> AccessTier {
        use Operation::*;

        match self {
            AuthLogin | Login | CreateUser => AccessTier::Open,

            ActivateUser | UpdateUserPass | DeleteUser | FollowUser | AcceptFollow
            | UnfollowUser | StartConversation | GetUserConversations | ReadConversation
            | SendDM | GetConversationDMs | CreatePost | GetFeed | UpdatePost | DeletePost
            | CreateComment | UpdateComment | DeleteComment => AccessTier::SelfOnly,

            GetUserPosts => AccessTier::FollowerOrSelf,

            GetUser | SearchUsers | GetUserFollowers | GetUserFollowing | GetUserPublicPosts
            | GetPost | GetComment | GetCommentsFromPost | RatePostUp | RatePostDown
            | RateCommentUp | RateCommentDown => AccessTier::PublicOverride,
        }
    }

    pub fn shape(&self) -> CallShape {
        use Operation::*;

        match self {
            SearchUsers | GetUserFollowers | GetUserFollowing | GetUserConversations
            | GetConversationDMs | GetUserPosts | GetUserPublicPosts | GetFeed
            | GetCommentsFromPost => CallShape::ServerStreaming,

            AuthLogin | Login | CreateUser | ActivateUser | GetUser | FollowUser
            | AcceptFollow | UnfollowUser | UpdateUserPass | DeleteUser | StartConversation
            | ReadConversation | SendDM | CreatePost | GetPost | RatePostUp | RatePostDown
            | UpdatePost | DeletePost | CreateComment | GetComment | RateCommentUp
            | RateCommentDown | UpdateComment | DeleteComment => CallShape::Unary,
        }
    }

    pub fn is_open(&self) -> bool {
        self.tier() == AccessTier::Open
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}
