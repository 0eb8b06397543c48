//! The `gabarito login`, `register`, `logout` and `whoami` commands.

use std::path::PathBuf;

use anyhow::Result;

use gabarito_core::access::Route;
use gabarito_core::labels::{fallback, role_label};
use gabarito_core::model::{Credentials, Registration, Role};

use super::context::Context;
use super::fail;

pub async fn login(config: Option<PathBuf>, email: String, password: String) -> Result<()> {
    let mut ctx = Context::load(config)?;
    ctx.gate(&Route::Login)?;

    let credentials = Credentials { email, password };
    let session = ctx
        .store
        .login(&ctx.backend, &credentials)
        .await
        .map_err(fail(fallback::LOGIN))?;

    println!(
        "Logged in as {} ({}).",
        session.user.name,
        role_label(session.role())
    );
    Ok(())
}

pub async fn register(
    config: Option<PathBuf>,
    name: String,
    email: String,
    password: String,
    role: String,
) -> Result<()> {
    let role: Role = role.parse().map_err(anyhow::Error::msg)?;
    for (field, value) in [("name", &name), ("email", &email), ("password", &password)] {
        if value.trim().is_empty() {
            anyhow::bail!("{field} must not be blank");
        }
    }

    let mut ctx = Context::load(config)?;
    ctx.gate(&Route::Register)?;

    let registration = Registration {
        name,
        email,
        password,
        role,
    };
    let session = ctx
        .store
        .register(&ctx.backend, &registration)
        .await
        .map_err(fail(fallback::REGISTER))?;

    println!(
        "Account created. Logged in as {} ({}).",
        session.user.name,
        role_label(session.role())
    );
    Ok(())
}

pub async fn logout(config: Option<PathBuf>) -> Result<()> {
    let mut ctx = Context::load(config)?;
    if !ctx.store.is_authenticated() {
        println!("Not logged in.");
        return Ok(());
    }

    let landing = ctx.store.logout(&ctx.backend).await?;
    println!("Logged out. Next: {landing}");
    Ok(())
}

pub async fn whoami(config: Option<PathBuf>) -> Result<()> {
    let mut ctx = Context::load(config)?;
    ctx.gate(&Route::ExamList)?;

    let session = ctx
        .store
        .refresh(&ctx.backend)
        .await
        .map_err(fail(fallback::LOAD))?;

    println!("{} <{}>", session.user.name, session.user.email);
    println!("Role: {}", role_label(session.role()));
    Ok(())
}
