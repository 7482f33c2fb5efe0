use crate::commands::profile::backend_error;
use crate::commands::AppContext;
use crate::output::{new_table, Output};
use crate::FriendsCommands;
use cinetrack_models::{Friend, FriendRequest, UserSearchResult};
use color_eyre::eyre::eyre;
use color_eyre::Result;
use tracing::info;

pub async fn run_friends(cmd: FriendsCommands, output: &Output) -> Result<()> {
    let ctx = AppContext::load()?;
    match cmd {
        FriendsCommands::List => {
            let friends = ctx.backend.friends().await.map_err(|e| backend_error("load friends", e))?;
            output.data(&friends, || print_friends(&friends, output));
        }
        FriendsCommands::Requests => {
            let requests = ctx
                .backend
                .friend_requests()
                .await
                .map_err(|e| backend_error("load friend requests", e))?;
            output.data(&requests, || print_requests(&requests, output));
        }
        FriendsCommands::Search { query } => {
            if query.trim().is_empty() {
                return Err(eyre!("Search query cannot be empty"));
            }
            let users = ctx
                .backend
                .search_users(&query)
                .await
                .map_err(|e| backend_error("search users", e))?;
            output.data(&users, || print_users(&query, &users, output));
        }
        FriendsCommands::Add { username } => {
            ctx.backend
                .send_friend_request(&username)
                .await
                .map_err(|e| backend_error("send friend request", e))?;
            info!(operation = "friend_request_sent", username = %username, "Friend request sent");
            output.success(format!("Friend request sent to {}", username));
        }
        FriendsCommands::Accept { request_id } => {
            ctx.backend
                .accept_friend_request(request_id)
                .await
                .map_err(|e| backend_error("accept friend request", e))?;
            info!(operation = "friend_request_accepted", request_id, "Friend request accepted");
            output.success(format!("Accepted friend request {}", request_id));
        }
        FriendsCommands::Remove { friend_id } => {
            ctx.backend
                .remove_friend(friend_id)
                .await
                .map_err(|e| backend_error("remove friend", e))?;
            info!(operation = "friend_removed", friend_id, "Friend removed");
            output.success(format!("Removed friend {}", friend_id));
        }
    }
    Ok(())
}

fn print_friends(friends: &[Friend], output: &Output) {
    if friends.is_empty() {
        output.info("No friends yet. Find people with 'cinetrack friends search <name>'");
        return;
    }
    let mut table = new_table(&["ID", "Username", "Friends since"]);
    for friend in friends {
        table.add_row(vec![
            friend.id.to_string(),
            friend.username.clone(),
            friend.since.map(|s| s.format("%Y-%m-%d").to_string()).unwrap_or_default(),
        ]);
    }
    output.table(&table);
}

fn print_requests(requests: &[FriendRequest], output: &Output) {
    if requests.is_empty() {
        output.info("No pending friend requests");
        return;
    }
    let mut table = new_table(&["Request", "From", "Sent"]);
    for request in requests {
        table.add_row(vec![
            request.id.to_string(),
            request.from_username.clone(),
            request.created_at.map(|s| s.format("%Y-%m-%d").to_string()).unwrap_or_default(),
        ]);
    }
    output.table(&table);
    output.info("Accept one with 'cinetrack friends accept <request>'");
}

fn print_users(query: &str, users: &[UserSearchResult], output: &Output) {
    if users.is_empty() {
        output.info(format!("No users match '{}'", query));
        return;
    }
    let mut table = new_table(&["ID", "Username", "Friend"]);
    for user in users {
        table.add_row(vec![
            user.id.to_string(),
            user.username.clone(),
            if user.is_friend { "yes" } else { "" }.to_string(),
        ]);
    }
    output.table(&table);
}
