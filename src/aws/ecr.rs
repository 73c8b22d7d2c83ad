//! ECR registry login

use crate::config::image::Registry;
use crate::utils::container::ContainerRuntime;
use crate::utils::exec::Invocation;

/// ECR always issues tokens for this user name
pub const ECR_USERNAME: &str = "AWS";

/// `aws ecr get-login-password --region R`
pub fn get_login_password(region: &str) -> Invocation {
    Invocation::new("aws").args(["ecr", "get-login-password", "--region", region])
}

/// Log the runtime in to the registry, the password piped from the AWS CLI
pub fn login(registry: &Registry, runtime: ContainerRuntime) -> Invocation {
    runtime
        .login_password_stdin(ECR_USERNAME, &registry.host())
        .stdin_from(get_login_password(&registry.region))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::exec::StdinSource;

    #[test]
    fn test_login_pipes_password() {
        let registry = Registry::new("123456789012", "us-east-2");
        let inv = login(&registry, ContainerRuntime::Docker);

        assert_eq!(inv.program, "docker");
        assert_eq!(
            inv.args,
            vec![
                "login",
                "--username",
                "AWS",
                "--password-stdin",
                "123456789012.dkr.ecr.us-east-2.amazonaws.com",
            ]
        );

        match inv.stdin {
            Some(StdinSource::Pipe(producer)) => {
                assert_eq!(
                    producer.command_line(),
                    "aws ecr get-login-password --region us-east-2"
                );
            }
            other => panic!("expected piped stdin, got {other:?}"),
        }
    }
}
