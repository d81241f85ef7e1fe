//! Redis 客户端模块
//!
//! 提供 Redis 连接管理和基于 `SET NX PX` 的租约操作，
//! 用于保证同一时刻只有一个实例执行定时通知轮询。

use crate::config::RedisConfig;
use crate::error::{AuraError, Result};
use redis::Client;
use redis::aio::MultiplexedConnection;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// 只有持有者匹配时才删除 key，避免误删其他实例在租约过期后重新获取的租约
const RELEASE_SCRIPT: &str = r#"
    if redis.call("get", KEYS[1]) == ARGV[1] then
        return redis.call("del", KEYS[1])
    else
        return 0
    end
"#;

/// 只有持有者匹配时才延长租约
const RENEW_SCRIPT: &str = r#"
    if redis.call("get", KEYS[1]) == ARGV[1] then
        return redis.call("pexpire", KEYS[1], ARGV[2])
    else
        return 0
    end
"#;

/// Redis 缓存客户端
#[derive(Clone)]
pub struct Cache {
    client: Client,
}

impl Cache {
    /// 创建 Redis 客户端
    pub fn new(config: &RedisConfig) -> Result<Self> {
        let client = Client::open(config.url.as_str())?;
        info!("Redis client created");
        Ok(Self { client })
    }

    async fn get_conn(&self) -> Result<MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(AuraError::from)
    }

    /// 健康检查
    pub async fn health_check(&self) -> Result<()> {
        let mut conn = self.get_conn().await?;
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map(|_| ())
            .map_err(AuraError::from)
    }

    /// 尝试获取租约
    ///
    /// 返回 true 表示当前 owner 获得了租约；false 表示租约被其他 owner 持有。
    #[instrument(skip(self))]
    pub async fn try_acquire_lease(&self, key: &str, owner: &str, ttl: Duration) -> Result<bool> {
        let mut conn = self.get_conn().await?;

        let result: Option<String> = redis::cmd("SET")
            .arg(CacheKey::lease(key))
            .arg(owner)
            .arg("NX")
            .arg("PX")
            .arg(ttl.as_millis() as u64)
            .query_async(&mut conn)
            .await?;

        let acquired = result.is_some();
        debug!(key = %key, owner = %owner, acquired, "Lease acquire attempted");
        Ok(acquired)
    }

    /// 续期租约
    ///
    /// 返回 false 表示租约已过期或已被其他 owner 获取
    #[instrument(skip(self))]
    pub async fn renew_lease(&self, key: &str, owner: &str, ttl: Duration) -> Result<bool> {
        let mut conn = self.get_conn().await?;

        let renewed: i32 = redis::Script::new(RENEW_SCRIPT)
            .key(CacheKey::lease(key))
            .arg(owner)
            .arg(ttl.as_millis() as u64)
            .invoke_async(&mut conn)
            .await?;

        Ok(renewed == 1)
    }

    /// 释放租约
    ///
    /// 租约已过期或被其他 owner 持有时只记录警告
    #[instrument(skip(self))]
    pub async fn release_lease(&self, key: &str, owner: &str) -> Result<()> {
        let mut conn = self.get_conn().await?;

        let released: i32 = redis::Script::new(RELEASE_SCRIPT)
            .key(CacheKey::lease(key))
            .arg(owner)
            .invoke_async(&mut conn)
            .await?;

        if released == 0 {
            warn!(
                key = %key,
                owner = %owner,
                "Lease was already released or owned by another instance"
            );
        } else {
            debug!(key = %key, "Lease released");
        }

        Ok(())
    }
}

/// 缓存键生成器
pub struct CacheKey;

impl CacheKey {
    pub fn lease(name: &str) -> String {
        format!("aura:lease:{}", name)
    }
}
