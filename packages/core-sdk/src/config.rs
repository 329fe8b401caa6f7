/**
 * \brief 构建期环境：开发版直连后端，发布版走同源代理。
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildProfile {
    Development,
    Production,
}

const DEFAULT_DEV_BACKEND: &str = "http://localhost:8787";
const DEFAULT_PROXY_ORIGIN: &str = "http://127.0.0.1:5173";
const DEFAULT_UPSTREAM: &str = "https://ai-service.licongcong-ok.workers.dev";

impl BuildProfile {
    /**
     * \brief 读取构建期 CHATLINK_ENV，未设置时按 debug_assertions 判断。
     */
    pub fn from_build() -> Self {
        Self::parse(option_env!("CHATLINK_ENV")).unwrap_or(if cfg!(debug_assertions) {
            BuildProfile::Development
        } else {
            BuildProfile::Production
        })
    }

    fn parse(value: Option<&str>) -> Option<Self> {
        match value?.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Some(BuildProfile::Development),
            "production" | "prod" => Some(BuildProfile::Production),
            _ => None,
        }
    }
}

/**
 * \brief 两种传输各自的完整端点地址。构造后不再变化。
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointConfig {
    pub rest_url: String,
    pub graphql_url: String,
}

impl EndpointConfig {
    pub fn new(rest_url: impl Into<String>, graphql_url: impl Into<String>) -> Self {
        Self {
            rest_url: rest_url.into(),
            graphql_url: graphql_url.into(),
        }
    }

    /**
     * \brief 以一个基地址推导两种端点：REST 为 base/，GraphQL 为 base/graphql。
     */
    pub fn from_base(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self::new(format!("{}/", base), format!("{}/graphql", base))
    }

    /**
     * \brief 按构建期环境解析端点。
     */
    pub fn for_profile(profile: BuildProfile) -> Self {
        match profile {
            BuildProfile::Development => {
                Self::from_base(option_env!("CHATLINK_DEV_BACKEND").unwrap_or(DEFAULT_DEV_BACKEND))
            }
            BuildProfile::Production => {
                let origin = option_env!("CHATLINK_PROXY_ORIGIN")
                    .unwrap_or(DEFAULT_PROXY_ORIGIN)
                    .trim_end_matches('/');
                Self::new(format!("{}/api", origin), format!("{}/api/graphql", origin))
            }
        }
    }

    pub fn from_build() -> Self {
        Self::for_profile(BuildProfile::from_build())
    }
}

/**
 * \brief 边缘代理进程的运行期配置。
 */
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /** \brief 真实后端地址，不带路径 */
    pub upstream: String,
    /** \brief 静态前端目录 */
    pub static_dir: String,
}

impl ProxyConfig {
    pub fn from_env() -> Self {
        Self {
            upstream: env_or("CHATLINK_UPSTREAM", DEFAULT_UPSTREAM),
            static_dir: env_or("CHATLINK_STATIC_DIR", "web"),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}
