// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Container log launcher selection.
//!
//! Picks the backend that tails container logs on this host. By default the
//! docker backend is tried first and kubernetes second; the order is reversed
//! when `kubernetes_collect_from_files` is set. If neither comes up, a lazy
//! docker backend with a retrier covers daemons started after the agent.
//! When even that fails the result is a [`NoopLauncher`].
//!
//! Backends themselves live with the caller, behind [`LauncherFactory`].

use log::{info, warn};
use std::time::Duration;
use thiserror::Error;

/// A component that can be started and stopped, possibly repeatedly.
pub trait Restartable: Send {
    fn start(&mut self);
    fn stop(&mut self);
}

/// Backend construction failure.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("{backend} backend unavailable: {reason}")]
    Unavailable {
        backend: &'static str,
        reason: String,
    },
}

/// Launcher selection inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LauncherOptions {
    pub collect_all: bool,
    pub kubernetes_collect_from_files: bool,
    pub docker_collect_from_files: bool,
    /// Read timeout of the docker client.
    pub docker_read_timeout: Duration,
}

impl Default for LauncherOptions {
    fn default() -> Self {
        Self {
            collect_all: false,
            kubernetes_collect_from_files: false,
            docker_collect_from_files: false,
            docker_read_timeout: Duration::from_secs(30),
        }
    }
}

/// Builds concrete backends. Implementations hold the log sources, service
/// registry, pipeline provider and auditor the backends need.
pub trait LauncherFactory {
    fn kubernetes(&self, collect_all: bool) -> Result<Box<dyn Restartable>, LaunchError>;

    fn docker(
        &self,
        read_timeout: Duration,
        with_retrier: bool,
        collect_from_files: bool,
    ) -> Result<Box<dyn Restartable>, LaunchError>;
}

/// Launcher that does nothing.
#[derive(Debug, Default)]
pub struct NoopLauncher;

impl Restartable for NoopLauncher {
    fn start(&mut self) {}
    fn stop(&mut self) {}
}

/// Select a container launcher for this environment.
pub fn new_launcher(
    options: &LauncherOptions,
    factory: &dyn LauncherFactory,
) -> Box<dyn Restartable> {
    let kubernetes = || match factory.kubernetes(options.collect_all) {
        Ok(launcher) => {
            info!("Kubernetes launcher initialized");
            Some(launcher)
        }
        Err(e) => {
            info!("Could not setup the kubernetes launcher: {}", e);
            None
        }
    };
    let docker = || match factory.docker(
        options.docker_read_timeout,
        false,
        options.docker_collect_from_files,
    ) {
        Ok(launcher) => {
            info!("Docker launcher initialized");
            Some(launcher)
        }
        Err(e) => {
            info!("Could not setup the docker launcher: {}", e);
            None
        }
    };

    let found = if options.kubernetes_collect_from_files {
        kubernetes().or_else(docker)
    } else {
        docker().or_else(kubernetes)
    };
    if let Some(launcher) = found {
        return launcher;
    }

    match factory.docker(
        options.docker_read_timeout,
        true,
        options.docker_collect_from_files,
    ) {
        Ok(launcher) => {
            info!("Container logs won't be collected unless a docker daemon is eventually started");
            launcher
        }
        Err(e) => {
            warn!(
                "Could not setup the docker launcher: {}. Will not be able to collect container logs",
                e
            );
            Box::new(NoopLauncher)
        }
    }
}
