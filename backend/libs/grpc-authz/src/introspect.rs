//! Request introspection
//!
//! Decodes the first request message of a call into a [`LenicRequest`] and
//! extracts the [`Target`] the call addresses. One variant per operation
//! kind, so the field that carries the target is fixed at compile time.

use prost::Message;
use thiserror::Error;

use crate::pb;
use crate::policy::Operation;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IntrospectError {
    #[error("malformed {operation} request: {reason}")]
    Malformed {
        operation: Operation,
        reason: String,
    },

    #[error("required field `{0}` is empty")]
    EmptyField(&'static str),

    /// Open operations carry no addressed resource
    #[error("{0} addresses no resource")]
    Unaddressed(Operation),
}

/// Who or what a call addresses
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Username compared directly against the caller
    Username(String),
    Resource(ResourceRef),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceRef {
    User(UserKey),
    Post(PostKey),
    /// Owned by the comment's author
    Comment(i32),
    /// Owned by the author of the comment's parent post
    CommentPost(i32),
    Conversation(ConversationKey),
    /// The user search index
    Directory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserKey {
    Id(i32),
    Name(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostKey {
    Guid(String),
    Id(i32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationKey {
    Id(i32),
    /// Conversation about to be started between two user ids
    Between(i32, i32),
}

/// A decoded request message, tagged by what it asks for
#[derive(Debug, Clone, PartialEq)]
pub enum LenicRequest {
    Login(pb::LoginRequest),
    CreateUser(pb::User),
    ActivateUser(pb::ActivateUserRequest),
    GetUser(pb::GetUserRequest),
    SearchUsers(pb::SearchUsersRequest),
    GetUserFollowers(pb::GetUserFollowersRequest),
    GetUserFollowing(pb::GetUserFollowingRequest),
    FollowUser(pb::FollowUserRequest),
    AcceptFollow(pb::AcceptFollowRequest),
    UnfollowUser(pb::UnfollowRequest),
    UpdateUserPass(pb::User),
    DeleteUser(pb::DeleteUserRequest),
    StartConversation(pb::Conversation),
    GetUserConversations(pb::GetUserConversationsRequest),
    ReadConversation(pb::ReadConversationRequest),
    SendDm(pb::Dm),
    GetConversationDms(pb::GetConversationDmsRequest),
    CreatePost(pb::Post),
    GetPost(pb::GetPostRequest),
    GetUserPosts(pb::GetUserPostsRequest),
    GetUserPublicPosts(pb::GetUserPublicPostsRequest),
    GetFeed(pb::GetFeedRequest),
    RatePost(pb::PostRating),
    UpdatePost(pb::Post),
    DeletePost(pb::DeletePostRequest),
    CreateComment(pb::Comment),
    GetComment(pb::GetCommentRequest),
    GetCommentsFromPost(pb::GetCommentsFromPostRequest),
    RateComment(pb::CommentRating),
    UpdateComment(pb::Comment),
    DeleteComment(pb::DeleteCommentRequest),
}

impl Operation {
    /// Decode a request message payload (without gRPC framing)
    pub fn decode(&self, payload: &[u8]) -> Result<LenicRequest, IntrospectError> {
        let operation = *self;
        let malformed = |e: prost::DecodeError| IntrospectError::Malformed {
            operation,
            reason: e.to_string(),
        };

        let request = match self {
            Operation::AuthLogin | Operation::Login => {
                LenicRequest::Login(pb::LoginRequest::decode(payload).map_err(malformed)?)
            }
            Operation::CreateUser => {
                LenicRequest::CreateUser(pb::User::decode(payload).map_err(malformed)?)
            }
            Operation::ActivateUser => LenicRequest::ActivateUser(
                pb::ActivateUserRequest::decode(payload).map_err(malformed)?,
            ),
            Operation::GetUser => {
                LenicRequest::GetUser(pb::GetUserRequest::decode(payload).map_err(malformed)?)
            }
            Operation::SearchUsers => LenicRequest::SearchUsers(
                pb::SearchUsersRequest::decode(payload).map_err(malformed)?,
            ),
            Operation::GetUserFollowers => LenicRequest::GetUserFollowers(
                pb::GetUserFollowersRequest::decode(payload).map_err(malformed)?,
            ),
            Operation::GetUserFollowing => LenicRequest::GetUserFollowing(
                pb::GetUserFollowingRequest::decode(payload).map_err(malformed)?,
            ),
            Operation::FollowUser => LenicRequest::FollowUser(
                pb::FollowUserRequest::decode(payload).map_err(malformed)?,
            ),
            Operation::AcceptFollow => LenicRequest::AcceptFollow(
                pb::AcceptFollowRequest::decode(payload).map_err(malformed)?,
            ),
            Operation::UnfollowUser => LenicRequest::UnfollowUser(
                pb::UnfollowRequest::decode(payload).map_err(malformed)?,
            ),
            Operation::UpdateUserPass => {
                LenicRequest::UpdateUserPass(pb::User::decode(payload).map_err(malformed)?)
            }
            Operation::DeleteUser => LenicRequest::DeleteUser(
                pb::DeleteUserRequest::decode(payload).map_err(malformed)?,
            ),
            Operation::StartConversation => LenicRequest::StartConversation(
                pb::Conversation::decode(payload).map_err(malformed)?,
            ),
            Operation::GetUserConversations => LenicRequest::GetUserConversations(
                pb::GetUserConversationsRequest::decode(payload).map_err(malformed)?,
            ),
            Operation::ReadConversation => LenicRequest::ReadConversation(
                pb::ReadConversationRequest::decode(payload).map_err(malformed)?,
            ),
            Operation::SendDM => LenicRequest::SendDm(pb::Dm::decode(payload).map_err(malformed)?),
            Operation::GetConversationDMs => LenicRequest::GetConversationDms(
                pb::GetConversationDmsRequest::decode(payload).map_err(malformed)?,
            ),
            Operation::CreatePost => {
                LenicRequest::CreatePost(pb::Post::decode(payload).map_err(malformed)?)
            }
            Operation::GetPost => {
                LenicRequest::GetPost(pb::GetPostRequest::decode(payload).map_err(malformed)?)
            }
            Operation::GetUserPosts => LenicRequest::GetUserPosts(
                pb::GetUserPostsRequest::decode(payload).map_err(malformed)?,
            ),
            Operation::GetUserPublicPosts => LenicRequest::GetUserPublicPosts(
                pb::GetUserPublicPostsRequest::decode(payload).map_err(malformed)?,
            ),
            Operation::GetFeed => {
                LenicRequest::GetFeed(pb::GetFeedRequest::decode(payload).map_err(malformed)?)
            }
            Operation::RatePostUp | Operation::RatePostDown => {
                LenicRequest::RatePost(pb::PostRating::decode(payload).map_err(malformed)?)
            }
            Operation::UpdatePost => {
                LenicRequest::UpdatePost(pb::Post::decode(payload).map_err(malformed)?)
            }
            Operation::DeletePost => LenicRequest::DeletePost(
                pb::DeletePostRequest::decode(payload).map_err(malformed)?,
            ),
            Operation::CreateComment => {
                LenicRequest::CreateComment(pb::Comment::decode(payload).map_err(malformed)?)
            }
            Operation::GetComment => LenicRequest::GetComment(
                pb::GetCommentRequest::decode(payload).map_err(malformed)?,
            ),
            Operation::GetCommentsFromPost => LenicRequest::GetCommentsFromPost(
                pb::GetCommentsFromPostRequest::decode(payload).map_err(malformed)?,
            ),
            Operation::RateCommentUp | Operation::RateCommentDown => {
                LenicRequest::RateComment(pb::CommentRating::decode(payload).map_err(malformed)?)
            }
            Operation::UpdateComment => {
                LenicRequest::UpdateComment(pb::Comment::decode(payload).map_err(malformed)?)
            }
            Operation::DeleteComment => LenicRequest::DeleteComment(
                pb::DeleteCommentRequest::decode(payload).map_err(malformed)?,
            ),
        };

        Ok(request)
    }
}

impl LenicRequest {
    /// The user or resource this request addresses
    pub fn target(&self) -> Result<Target, IntrospectError> {
        use LenicRequest as R;

        let target = match self {
            R::Login(_) => return Err(IntrospectError::Unaddressed(Operation::Login)),
            R::CreateUser(_) => return Err(IntrospectError::Unaddressed(Operation::CreateUser)),

            R::ActivateUser(r) => username(&r.username)?,
            R::DeleteUser(r) => username(&r.username)?,
            R::UpdateUserPass(u) => username(&u.username)?,
            R::GetUserConversations(r) => username(&r.username)?,
            R::GetFeed(r) => username(&r.username)?,
            R::GetUserPosts(r) => username(&r.username)?,

            R::GetUser(r) => user_by_name(&r.username)?,
            R::GetUserFollowers(r) => user_by_name(&r.username)?,
            R::GetUserFollowing(r) => user_by_name(&r.username)?,
            R::GetUserPublicPosts(r) => user_by_name(&r.username)?,

            R::SearchUsers(_) => Target::Resource(ResourceRef::Directory),

            R::FollowUser(r) => user_by_id(r.follower_id, "follower_id")?,
            R::UnfollowUser(r) => user_by_id(r.follower_id, "follower_id")?,
            R::AcceptFollow(r) => user_by_id(r.followed_id, "followed_id")?,

            R::StartConversation(c) => Target::Resource(ResourceRef::Conversation(
                ConversationKey::Between(id(c.user1_id, "user1_id")?, id(c.user2_id, "user2_id")?),
            )),
            R::ReadConversation(r) => conversation(r.id, "id")?,
            R::GetConversationDms(r) => conversation(r.id, "id")?,
            R::SendDm(dm) => conversation(dm.conversation_id, "conversation_id")?,

            R::CreatePost(p) => user_by_id(p.author_id, "author_id")?,
            R::CreateComment(c) => user_by_id(c.author_id, "author_id")?,

            R::UpdatePost(p) => post_by_guid(&p.post_guid, "post_guid")?,
            R::DeletePost(r) => post_by_guid(&r.uuid, "uuid")?,
            R::GetPost(r) => post_by_guid(&r.uuid, "uuid")?,
            R::GetCommentsFromPost(r) => post_by_guid(&r.uuid, "uuid")?,

            R::RatePost(r) => {
                Target::Resource(ResourceRef::Post(PostKey::Id(id(r.post_id, "post_id")?)))
            }

            R::UpdateComment(c) => Target::Resource(ResourceRef::Comment(id(c.id, "id")?)),
            R::DeleteComment(r) => Target::Resource(ResourceRef::Comment(id(r.id, "id")?)),

            R::GetComment(r) => Target::Resource(ResourceRef::CommentPost(id(r.id, "id")?)),
            R::RateComment(r) => {
                Target::Resource(ResourceRef::CommentPost(id(r.comment_id, "comment_id")?))
            }
        };

        Ok(target)
    }

    /// Checks this request needs on top of its tier
    ///
    /// Requests that name an acting user (the sender of a DM, the user a
    /// rating is recorded for) must name the caller. A comment must attach
    /// to a post the caller can read.
    pub fn conditions(&self) -> Result<Vec<Condition>, IntrospectError> {
        use LenicRequest as R;

        let conditions = match self {
            R::SendDm(dm) => vec![Condition::ActingAs(user_by_id(dm.sender_id, "sender_id")?)],
            R::RatePost(r) => vec![Condition::ActingAs(user_by_id(r.user_id, "user_id")?)],
            R::RateComment(r) => vec![Condition::ActingAs(user_by_id(r.user_id, "user_id")?)],
            R::CreateComment(c) => vec![Condition::Reads(post_by_guid(&c.post_guid, "post_guid")?)],
            _ => Vec::new(),
        };

        Ok(conditions)
    }
}

/// A check a request carries besides its addressed target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// The caller must be this user
    ActingAs(Target),
    /// The caller must be allowed to read this resource
    Reads(Target),
}

fn non_empty<'a>(value: &'a str, field: &'static str) -> Result<&'a str, IntrospectError> {
    if value.trim().is_empty() {
        return Err(IntrospectError::EmptyField(field));
    }
    Ok(value)
}

fn id(value: i32, field: &'static str) -> Result<i32, IntrospectError> {
    if value <= 0 {
        return Err(IntrospectError::EmptyField(field));
    }
    Ok(value)
}

fn username(value: &str) -> Result<Target, IntrospectError> {
    Ok(Target::Username(non_empty(value, "username")?.to_string()))
}

fn user_by_name(value: &str) -> Result<Target, IntrospectError> {
    let name = non_empty(value, "username")?;
    Ok(Target::Resource(ResourceRef::User(UserKey::Name(name.to_string()))))
}

fn user_by_id(value: i32, field: &'static str) -> Result<Target, IntrospectError> {
    Ok(Target::Resource(ResourceRef::User(UserKey::Id(id(value, field)?))))
}

fn post_by_guid(value: &str, field: &'static str) -> Result<Target, IntrospectError> {
    let guid = non_empty(value, field)?;
    Ok(Target::Resource(ResourceRef::Post(PostKey::Guid(guid.to_string()))))
}

fn conversation(value: i32, field: &'static str) -> Result<Target, IntrospectError> {
    Ok(Target::Resource(ResourceRef::Conversation(ConversationKey::Id(
        id(value, field)?,
    ))))
}
