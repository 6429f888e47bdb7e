//! Demo controllers served by the `tern` binary
//!
//! A home controller with static greetings and a users controller doing CRUD
//! over an in-memory store.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use tern_core::{
    Args, Binding, ControllerSpec, Handler, HandlerError, HandlerSpec, Method, Request, Response,
    RouteRegistrationError, RouteTable, StatusCode,
};

const USER_PATH: &str = r"/users/(?P<uid>\d+)";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub uid: u64,
    pub name: String,
    pub age: u32,
}

/// Request body for creating or replacing a user
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub age: u32,
}

#[derive(Debug, Default)]
struct Users {
    next_uid: u64,
    by_uid: BTreeMap<u64, User>,
}

/// Shared in-memory user store
#[derive(Debug, Clone, Default)]
pub struct UserStore {
    inner: Arc<RwLock<Users>>,
}

impl UserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-filled with `count` users named `user_name_<uid>`
    pub fn seeded(count: u64) -> Self {
        let by_uid = (0..count)
            .map(|uid| {
                let user = User {
                    uid,
                    name: format!("user_name_{}", uid),
                    age: 18 + (uid * 7 % 100) as u32,
                };
                (uid, user)
            })
            .collect();
        Self {
            inner: Arc::new(RwLock::new(Users {
                next_uid: count,
                by_uid,
            })),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Users>, HandlerError> {
        self.inner.read().map_err(|_| HandlerError::msg("user store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Users>, HandlerError> {
        self.inner.write().map_err(|_| HandlerError::msg("user store lock poisoned"))
    }

    pub fn list(&self) -> Result<Vec<User>, HandlerError> {
        Ok(self.read()?.by_uid.values().cloned().collect())
    }

    pub fn get(&self, uid: u64) -> Result<Option<User>, HandlerError> {
        Ok(self.read()?.by_uid.get(&uid).cloned())
    }

    pub fn insert(&self, new: NewUser) -> Result<User, HandlerError> {
        let mut users = self.write()?;
        let uid = users.next_uid;
        users.next_uid += 1;
        let user = User {
            uid,
            name: new.name,
            age: new.age,
        };
        users.by_uid.insert(uid, user.clone());
        Ok(user)
    }

    /// Replace an existing user; `None` if there is no such uid
    pub fn update(&self, uid: u64, new: NewUser) -> Result<Option<User>, HandlerError> {
        let mut users = self.write()?;
        Ok(users.by_uid.get_mut(&uid).map(|user| {
            user.name = new.name;
            user.age = new.age;
            user.clone()
        }))
    }

    pub fn remove(&self, uid: u64) -> Result<Option<User>, HandlerError> {
        Ok(self.write()?.by_uid.remove(&uid))
    }
}

fn to_value<T: Serialize>(value: &T) -> Result<Value, HandlerError> {
    serde_json::to_value(value).map_err(HandlerError::msg)
}

/// Greetings and health check, mounted at the root
pub fn home_controller() -> ControllerSpec {
    let hello = Handler::new("get_hello_world", |_: &mut Args<'_>| {
        Ok(Response::ok(json!("hello world!")))
    });
    let health = Handler::new("health_check", |args: &mut Args<'_>| {
        let request: &Request = args.request(0)?;
        Ok(Response::ok(json!({
            "status": "ok",
            "version": request.version().as_str(),
        })))
    });

    ControllerSpec::new("HomeController")
        .handler(
            HandlerSpec::new(hello)
                .path("/")
                .path("/home")
                .path("/index.html")
                .methods(&[Method::GET, Method::HEAD]),
        )
        .handler(
            HandlerSpec::new(health)
                .path("/health")
                .method(Method::GET)
                .bind(Binding::request("request")),
        )
}

/// User CRUD under `/api`
pub fn user_controller(store: UserStore) -> ControllerSpec {
    let list = {
        let store = store.clone();
        Handler::new("get_users", move |_: &mut Args<'_>| {
            Ok(Response::ok(to_value(&store.list()?)?))
        })
    };

    let search = {
        let store = store.clone();
        Handler::new("find_users", move |args: &mut Args<'_>| {
            let name: String = args.take(0)?;
            let found: Vec<User> = store
                .list()?
                .into_iter()
                .filter(|user| user.name.contains(name.as_str()))
                .collect();
            debug!(query = %name, found = found.len(), "user search");
            Ok(Response::ok(to_value(&found)?))
        })
    };

    let get = {
        let store = store.clone();
        Handler::new("get_user", move |args: &mut Args<'_>| {
            let uid: u64 = args.take(0)?;
            Ok(match store.get(uid)? {
                Some(user) => Response::ok(to_value(&user)?),
                None => Response::not_found(),
            })
        })
    };

    let create = {
        let store = store.clone();
        Handler::new("add_user", move |args: &mut Args<'_>| {
            let new: NewUser = args.take(0)?;
            let user = store.insert(new)?;
            info!(uid = user.uid, "user created");
            Ok(Response::with(StatusCode::CREATED, to_value(&user)?)
                .header("Location", format!("/api/users/{}", user.uid)))
        })
    };

    let update = {
        let store = store.clone();
        Handler::new("modify_user", move |args: &mut Args<'_>| {
            let uid: u64 = args.take(0)?;
            let new: NewUser = args.take(1)?;
            Ok(match store.update(uid, new)? {
                Some(user) => Response::ok(to_value(&user)?),
                None => Response::not_found(),
            })
        })
    };

    let delete = Handler::new("delete_user", move |args: &mut Args<'_>| {
        let uid: u64 = args.take(0)?;
        Ok(match store.remove(uid)? {
            Some(_) => Response::<Value>::with_status(StatusCode::NO_CONTENT),
            None => Response::not_found(),
        })
    });

    ControllerSpec::new("UserController")
        .prefixes(["/api"])
        .handler(
            HandlerSpec::new(list)
                .path("/users")
                .path("/userhome")
                .method(Method::GET),
        )
        .handler(
            HandlerSpec::new(search)
                .path("/users/search")
                .method(Method::GET)
                .bind(Binding::query::<String>("name")),
        )
        .handler(
            HandlerSpec::new(get)
                .path(USER_PATH)
                .method(Method::GET)
                .bind(Binding::path::<u64>("uid", "uid")),
        )
        .handler(
            HandlerSpec::new(create)
                .path("/users")
                .method(Method::POST)
                .bind(Binding::body::<NewUser>("user")),
        )
        .handler(
            HandlerSpec::new(update)
                .path(USER_PATH)
                .method(Method::PUT)
                .bind(Binding::path::<u64>("uid", "uid"))
                .bind(Binding::body::<NewUser>("user")),
        )
        .handler(
            HandlerSpec::new(delete)
                .path(USER_PATH)
                .method(Method::DELETE)
                .bind(Binding::path::<u64>("uid", "uid")),
        )
}

/// Route table with every demo controller registered
pub fn demo_routes(store: UserStore) -> Result<RouteTable<Value>, RouteRegistrationError> {
    let mut builder = RouteTable::<Value>::builder();
    builder.register_controller(home_controller())?;
    builder.register_controller(user_controller(store))?;
    Ok(builder.build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tern_core::HttpParser;

    fn handle(table: &RouteTable<Value>, raw: &[u8]) -> Response<Value> {
        let request = HttpParser::new().parse_bytes(raw).unwrap();
        table.handle(&request).unwrap().unwrap()
    }

    #[test]
    fn test_store_crud() {
        let store = UserStore::seeded(3);
        assert_eq!(store.list().unwrap().len(), 3);

        let user = store
            .insert(NewUser {
                name: "ada".to_string(),
                age: 36,
            })
            .unwrap();
        assert_eq!(user.uid, 3);

        let updated = store
            .update(3, NewUser {
                name: "ada lovelace".to_string(),
                age: 37,
            })
            .unwrap()
            .unwrap();
        assert_eq!(updated.age, 37);
        assert!(store.update(99, NewUser { name: "x".to_string(), age: 1 }).unwrap().is_none());

        assert!(store.remove(3).unwrap().is_some());
        assert!(store.get(3).unwrap().is_none());
    }

    #[test]
    fn test_demo_routes() {
        let table = demo_routes(UserStore::seeded(5)).unwrap();

        let response = handle(&table, b"GET /index.html HTTP/1.1\r\n\r\n");
        assert_eq!(response.body, Some(json!("hello world!")));

        let response = handle(&table, b"GET /api/userhome HTTP/1.1\r\n\r\n");
        assert_eq!(response.body.unwrap().as_array().unwrap().len(), 5);

        let response = handle(&table, b"GET /api/users/2 HTTP/1.1\r\n\r\n");
        assert_eq!(response.body.unwrap()["name"], "user_name_2");

        let response = handle(&table, b"GET /api/users/search?name=_4 HTTP/1.1\r\n\r\n");
        assert_eq!(response.body.unwrap().as_array().unwrap().len(), 1);

        let response = handle(&table, b"DELETE /api/users/42 HTTP/1.1\r\n\r\n");
        assert_eq!(response.status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_create_and_modify() {
        let store = UserStore::seeded(1);
        let table = demo_routes(store.clone()).unwrap();

        let response = handle(
            &table,
            b"POST /api/users HTTP/1.1\r\nContent-Type: application/json\r\n\r\n{\"name\":\"grace\",\"age\":45}",
        );
        assert_eq!(response.status, StatusCode::CREATED);
        assert_eq!(response.headers.get("Location").map(String::as_str), Some("/api/users/1"));

        let response = handle(
            &table,
            b"PUT /api/users/1 HTTP/1.1\r\n\r\n{\"name\":\"grace hopper\",\"age\":46}",
        );
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(store.get(1).unwrap().unwrap().name, "grace hopper");

        let response = handle(&table, b"DELETE /api/users/1 HTTP/1.1\r\n\r\n");
        assert_eq!(response.status, StatusCode::NO_CONTENT);
        assert!(store.get(1).unwrap().is_none());
    }
}
